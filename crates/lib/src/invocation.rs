//! Turning a command line into an operation on a [`Builder`].

use futures::future::join_all;
use tracing::{error, info};

use crate::builder::Builder;
use crate::error::{BuildError, Result};

/// Target built when none is named.
pub const DEFAULT_TARGET: &str = "default";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operation {
  #[default]
  Build,
  ListTargets,
  DescribeTargets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  pub operation: Operation,
  pub targets: Vec<String>,
  pub verbose: bool,
}

/// Converts back-slashes to forward slashes so tab-completed Windows paths
/// name the same targets.
pub fn normalize_target_name(name: &str) -> String {
  name.replace('\\', "/")
}

impl Invocation {
  /// The requested targets, or the default target if none were named.
  pub fn targets_or_default(&self) -> Vec<String> {
    if self.targets.is_empty() {
      vec![DEFAULT_TARGET.to_string()]
    } else {
      self.targets.clone()
    }
  }

  pub async fn run(&self, builder: &Builder) -> Result<Outcome> {
    match self.operation {
      Operation::Build => Ok(Outcome::Built(build_all(builder, &self.targets_or_default()).await)),
      Operation::ListTargets => {
        let targets = builder.fetch_all_targets().await?;
        Ok(Outcome::Listed(targets.keys().cloned().collect()))
      }
      Operation::DescribeTargets => {
        let targets = builder.fetch_all_targets().await?;
        Ok(Outcome::Described(
          targets
            .iter()
            .map(|(name, target)| TargetDescription {
              name: name.clone(),
              description: target.description.clone(),
            })
            .collect(),
        ))
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescription {
  pub name: String,
  pub description: Option<String>,
}

impl std::fmt::Display for TargetDescription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.description {
      Some(description) => write!(f, "{} ; {}", self.name, description),
      None => f.write_str(&self.name),
    }
  }
}

/// Result of a completed invocation.
#[derive(Debug)]
pub enum Outcome {
  Built(BuildReport),
  Listed(Vec<String>),
  Described(Vec<TargetDescription>),
}

impl Outcome {
  pub fn is_success(&self) -> bool {
    match self {
      Outcome::Built(report) => report.is_success(),
      Outcome::Listed(_) | Outcome::Described(_) => true,
    }
  }
}

/// Per-target results of a build operation.
#[derive(Debug, Default)]
pub struct BuildReport {
  pub succeeded: Vec<String>,
  pub failed: Vec<(String, BuildError)>,
}

impl BuildReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }
}

/// Builds every name in `targets` together and waits for all of them.
///
/// Each top-level request is rooted at `argv[i]` in the dependency trace.
pub async fn build_all(builder: &Builder, targets: &[String]) -> BuildReport {
  let builds = targets
    .iter()
    .enumerate()
    .map(|(i, name)| builder.build(name, &[format!("argv[{i}]")]));
  let results = join_all(builds).await;

  let mut report = BuildReport::default();
  for (name, result) in targets.iter().zip(results) {
    match result {
      Ok(()) => {
        info!(target = %name, "target up to date");
        report.succeeded.push(name.clone());
      }
      Err(err) => {
        error!(target = %name, error = %err, "target failed");
        report.failed.push((name.clone(), err));
      }
    }
  }
  report
}
