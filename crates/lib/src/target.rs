//! Target definitions and the context handed to build actions.

use std::fmt;
use std::future::Future;
use std::path;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::builder::Builder;
use crate::error::{BuildError, Result};
use crate::fs;
use crate::process::{Command, ProcessOptions};

fn absolute(name: &str) -> Result<String> {
  let path = path::absolute(name).map_err(|e| BuildError::io(name, e))?;
  Ok(path.to_string_lossy().into_owned())
}

/// Future returned by a build action.
pub type ActionFuture = BoxFuture<'static, Result<()>>;

/// Side-effecting operation that produces or updates a target's artifact.
pub type Action = Arc<dyn Fn(BuildContext) -> ActionFuture + Send + Sync>;

/// Computes additional prerequisite names each time a target is considered.
pub type PrereqFn = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// Everything an action gets to know about the build it is part of.
#[derive(Clone)]
pub struct BuildContext {
  /// Handle to the running engine, for ad-hoc builds and sub-processes.
  pub builder: Builder,
  /// The full, deduplicated prerequisite set of the target, sorted.
  pub prereq_names: Vec<String>,
  pub target_name: String,
}

/// A rule describing how to bring one named target up to date.
#[derive(Clone, Default)]
pub struct Target {
  pub description: Option<String>,
  pub prereqs: Vec<String>,
  pub dynamic_prereqs: Option<PrereqFn>,
  pub action: Option<Action>,
  /// The artifact is a directory; its mtime is refreshed after a successful build.
  pub is_directory: bool,
  /// Leave the artifact in place when the action fails.
  pub keep_on_failure: bool,
}

impl Target {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn prereq(mut self, name: impl Into<String>) -> Self {
    self.prereqs.push(name.into());
    self
  }

  pub fn prereqs<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.prereqs.extend(names.into_iter().map(Into::into));
    self
  }

  pub fn dynamic_prereqs<F>(mut self, f: F) -> Self
  where
    F: Fn() -> Vec<String> + Send + Sync + 'static,
  {
    self.dynamic_prereqs = Some(Arc::new(f));
    self
  }

  pub fn action<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(BuildContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    self.action = Some(Arc::new(move |ctx| f(ctx).boxed()));
    self
  }

  /// Uses an external command as the action.
  ///
  /// The target's parent directory is created first, and the process sees
  /// `TMAKE_TARGET` and `TMAKE_PREREQS` (space separated) in its environment.
  /// Both hold absolute paths, so they stay valid when `options.cwd` moves
  /// the process elsewhere.
  pub fn command(self, command: Command, options: ProcessOptions) -> Self {
    self.action(move |ctx: BuildContext| {
      let command = command.clone();
      let mut options = options.clone();
      async move {
        fs::ensure_parent_dirs(&ctx.target_name).await?;
        let target = absolute(&ctx.target_name)?;
        let prereqs = ctx.prereq_names.iter().map(|name| absolute(name)).collect::<Result<Vec<_>>>()?;
        options.env.insert("TMAKE_TARGET".to_string(), target);
        options.env.insert("TMAKE_PREREQS".to_string(), prereqs.join(" "));
        ctx.builder.run(&command, &options).await?;
        Ok(())
      }
    })
  }

  pub fn directory(mut self) -> Self {
    self.is_directory = true;
    self
  }

  pub fn keep_on_failure(mut self) -> Self {
    self.keep_on_failure = true;
    self
  }
}

impl fmt::Debug for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Target")
      .field("description", &self.description)
      .field("prereqs", &self.prereqs)
      .field("dynamic_prereqs", &self.dynamic_prereqs.is_some())
      .field("action", &self.action.is_some())
      .field("is_directory", &self.is_directory)
      .field("keep_on_failure", &self.keep_on_failure)
      .finish()
  }
}

/// Result of looking a name up in the registry.
#[derive(Debug, Clone)]
pub enum TargetLookup {
  /// A rule is registered under this name.
  Rule(Arc<Target>),
  /// No rule; the name is treated as a plain filesystem path.
  File,
}
