//! Dependency resolver and incremental build engine.
//!
//! A [`Builder`] resolves a requested target by first bringing every one of
//! its prerequisites up to date, then comparing modification times to decide
//! whether the target's own action has to run. Each target is attempted at
//! most once per builder: the outcome is memoized as a shared future, so
//! every requester of the same name observes the same single execution.
//!
//! All work happens inside the caller's task. Prerequisites are started
//! together and awaited together; the engine never spawns threads of its own.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info, warn};

use crate::error::{BuildError, Result};
use crate::fs;
use crate::process::{Command, ProcessOptions, ProcessRunner};
use crate::registry::{TargetMap, TargetRegistry};
use crate::target::{BuildContext, Target, TargetLookup};

type SharedBuild = Shared<BoxFuture<'static, Result<()>>>;

/// Per-run bookkeeping. The lock is never held across a suspension point.
#[derive(Default)]
struct RunState {
  /// In-flight or completed build of every target requested so far.
  builds: HashMap<String, SharedBuild>,
  /// Prerequisite sets of targets whose resolution has started.
  edges: HashMap<String, Vec<String>>,
}

struct Inner {
  registry: TargetRegistry,
  global_prereqs: Vec<String>,
  runner: ProcessRunner,
  state: Mutex<RunState>,
}

/// Handle to one build run. Cloning is cheap and shares the run.
#[derive(Clone)]
pub struct Builder {
  inner: Arc<Inner>,
}

impl Builder {
  pub fn new(registry: TargetRegistry) -> Self {
    Self::with_global_prereqs(registry, Vec::new())
  }

  /// Creates a builder where every target implicitly depends on `global_prereqs`,
  /// such as the build description itself.
  pub fn with_global_prereqs(registry: TargetRegistry, global_prereqs: Vec<String>) -> Self {
    Self {
      inner: Arc::new(Inner {
        registry,
        global_prereqs,
        runner: ProcessRunner::new(),
        state: Mutex::new(RunState::default()),
      }),
    }
  }

  pub fn global_prereqs(&self) -> &[String] {
    &self.inner.global_prereqs
  }

  pub fn registry(&self) -> &TargetRegistry {
    &self.inner.registry
  }

  pub async fn fetch_all_targets(&self) -> Result<&TargetMap> {
    self.inner.registry.fetch_all_targets().await
  }

  /// Runs an external command through the builder's process runner.
  pub async fn run(&self, command: &Command, options: &ProcessOptions) -> Result<i32> {
    self.inner.runner.run(command, options).await
  }

  /// Sets the modification time of `path` to now.
  pub async fn touch(&self, path: impl AsRef<Path>) -> Result<()> {
    fs::touch(path).await
  }

  fn state(&self) -> MutexGuard<'_, RunState> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Brings `target_name` up to date.
  ///
  /// `path` is the chain of names that led to this request and is only used
  /// for diagnostics and cycle detection. Repeated requests for the same name
  /// return the outcome of the first one.
  pub fn build(&self, target_name: &str, path: &[String]) -> BoxFuture<'static, Result<()>> {
    if path.iter().any(|name| name == target_name) {
      return future::ready(Err(cycle(path, target_name))).boxed();
    }

    let mut state = self.state();
    if let Some(existing) = state.builds.get(target_name) {
      // The requester may be waiting on this target through another branch.
      if let Some(requester) = path.last()
        && reaches(&state.edges, target_name, requester)
      {
        return future::ready(Err(cycle(path, target_name))).boxed();
      }
      return existing.clone().boxed();
    }

    let this = self.clone();
    let name = target_name.to_string();
    let path = path.to_vec();
    let build = async move { this.resolve(name, path).await }.boxed().shared();
    state.builds.insert(target_name.to_string(), build.clone());
    build.boxed()
  }

  async fn resolve(self, target_name: String, path: Vec<String>) -> Result<()> {
    match self.inner.registry.fetch_target(&target_name).await? {
      TargetLookup::File => {
        if fs::exists(&target_name).await {
          debug!(target = %target_name, "exists but has no build rule; assuming up to date");
          Ok(())
        } else {
          Err(BuildError::MissingRule { target: target_name })
        }
      }
      TargetLookup::Rule(target) => self.build_target(&target, target_name, path).await,
    }
  }

  /// Explicit, dynamic and global prerequisites, deduplicated.
  ///
  /// A target that is itself a global prerequisite does not pick up the
  /// globals, otherwise it would depend on itself or on its fellow globals.
  fn prereq_set(&self, target: &Target, target_name: &str) -> BTreeSet<String> {
    let mut set: BTreeSet<String> = target.prereqs.iter().cloned().collect();
    if let Some(dynamic) = &target.dynamic_prereqs {
      set.extend(dynamic());
    }
    let globals = &self.inner.global_prereqs;
    if !globals.iter().any(|global| global == target_name) {
      set.extend(globals.iter().cloned());
    }
    set
  }

  async fn build_target(&self, target: &Target, target_name: String, path: Vec<String>) -> Result<()> {
    let prereq_names: Vec<String> = self.prereq_set(target, &target_name).into_iter().collect();
    if prereq_names.is_empty() {
      debug!(target = %target_name, "no prerequisites");
    } else {
      debug!(target = %target_name, prereqs = %prereq_names.join(", "), "resolving prerequisites");
    }

    self.state().edges.insert(target_name.clone(), prereq_names.clone());

    let mut prereq_path = path.clone();
    prereq_path.push(target_name.clone());

    let prereq_builds = prereq_names.iter().map(|name| {
      let build = self.build(name, &prereq_path);
      let name = name.clone();
      async move {
        build.await?;
        let mtime = fs::mtime_recursive(&name).await?;
        Ok::<_, BuildError>((name, mtime))
      }
    });

    let (target_mtime, prereq_results) =
      future::join(fs::mtime_recursive(&target_name), future::join_all(prereq_builds)).await;

    // Siblings run to completion; the first failure is reported.
    let prereqs = prereq_results.into_iter().collect::<Result<Vec<_>>>()?;
    let target_mtime = target_mtime?;

    if !is_stale(&target_name, target_mtime, &prereqs) {
      debug!(target = %target_name, "already up to date");
      return Ok(());
    }

    let Some(action) = &target.action else {
      debug!(target = %target_name, "no build action; assuming up to date");
      return Ok(());
    };

    info!(target = %target_name, "building");
    let ctx = BuildContext {
      builder: self.clone(),
      prereq_names,
      target_name: target_name.clone(),
    };

    match action(ctx).await {
      Ok(()) => {
        info!(target = %target_name, "build complete");
        if target.is_directory {
          fs::touch(&target_name).await?;
        }
        Ok(())
      }
      Err(err) => {
        let mut trace = path;
        trace.push(target_name.clone());
        error!(trace = %trace.join(" > "), error = %err, "build failed");

        if !target.keep_on_failure {
          warn!(target = %target_name, "removing failed artifact");
          if let Err(remove_err) = fs::remove_recursive(&target_name).await {
            error!(target = %target_name, error = %remove_err, "failed to remove artifact");
          }
        }

        Err(BuildError::ActionFailed {
          target: target_name,
          trace,
          source: Box::new(err),
        })
      }
    }
  }
}

/// Decides whether a target must be rebuilt.
///
/// A missing artifact is always stale. Otherwise the target is stale if any
/// prerequisite is missing or strictly newer than it.
pub(crate) fn is_stale(
  target_name: &str,
  target_mtime: Option<SystemTime>,
  prereqs: &[(String, Option<SystemTime>)],
) -> bool {
  let Some(target_mtime) = target_mtime else {
    debug!(target = %target_name, "no modification time; need rebuild");
    return true;
  };

  let mut stale = false;
  for (name, mtime) in prereqs {
    match mtime {
      Some(mtime) if *mtime <= target_mtime => {
        debug!(target = %target_name, prereq = %name, "prerequisite not newer");
      }
      _ => {
        debug!(target = %target_name, prereq = %name, ?mtime, ?target_mtime, "out of date");
        stale = true;
      }
    }
  }
  stale
}

fn cycle(path: &[String], target_name: &str) -> BuildError {
  let mut trace = path.to_vec();
  trace.push(target_name.to_string());
  BuildError::Cycle { trace }
}

/// Returns true if `to` can be reached from `from` along recorded prerequisite edges.
fn reaches(edges: &HashMap<String, Vec<String>>, from: &str, to: &str) -> bool {
  let mut seen = HashSet::new();
  let mut stack = vec![from];
  while let Some(name) = stack.pop() {
    if name == to {
      return true;
    }
    if !seen.insert(name) {
      continue;
    }
    if let Some(next) = edges.get(name) {
      stack.extend(next.iter().map(String::as_str));
    }
  }
  false
}
