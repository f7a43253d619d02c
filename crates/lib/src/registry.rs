//! Registry of named targets.
//!
//! Holds the statically configured rules plus, optionally, a generator that
//! supplies more rules asynchronously. The generator runs at most once per
//! registry; its outcome is cached and merged over the static rules.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{BuildError, Result};
use crate::target::{Target, TargetLookup};

/// All known rules, keyed and ordered by target name.
pub type TargetMap = BTreeMap<String, Arc<Target>>;

type Generator = Box<dyn Fn() -> BoxFuture<'static, Result<BTreeMap<String, Target>>> + Send + Sync>;

#[derive(Default)]
pub struct TargetRegistry {
  targets: TargetMap,
  generator: Option<Generator>,
  all: OnceCell<Result<TargetMap, BuildError>>,
}

impl TargetRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `target` under `name`, replacing any previous rule.
  pub fn insert(&mut self, name: impl Into<String>, target: Target) {
    self.targets.insert(name.into(), Arc::new(target));
  }

  pub fn with_target(mut self, name: impl Into<String>, target: Target) -> Self {
    self.insert(name, target);
    self
  }

  /// Sets the supplier of generated targets.
  ///
  /// Generated rules win over static rules with the same name.
  pub fn with_generator<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BTreeMap<String, Target>>> + Send + 'static,
  {
    self.generator = Some(Box::new(move || f().boxed()));
    self
  }

  /// Returns the union of static and generated targets.
  pub async fn fetch_all_targets(&self) -> Result<&TargetMap> {
    self
      .all
      .get_or_init(|| async {
        let mut all = self.targets.clone();
        if let Some(generator) = &self.generator {
          let generated = generator().await?;
          debug!(count = generated.len(), "fetched generated targets");
          all.extend(generated.into_iter().map(|(name, target)| (name, Arc::new(target))));
        }
        Ok(all)
      })
      .await
      .as_ref()
      .map_err(Clone::clone)
  }

  /// Looks up the rule for `name`. A missing rule is not an error.
  pub async fn fetch_target(&self, name: &str) -> Result<TargetLookup> {
    let targets = self.fetch_all_targets().await?;
    Ok(match targets.get(name) {
      Some(target) => TargetLookup::Rule(target.clone()),
      None => TargetLookup::File,
    })
  }
}

impl fmt::Debug for TargetRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TargetRegistry")
      .field("targets", &self.targets)
      .field("generator", &self.generator.is_some())
      .finish()
  }
}
