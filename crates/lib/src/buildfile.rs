//! Declarative build descriptions.
//!
//! A Buildfile is a TOML document mapping target names to rules:
//!
//! ```toml
//! global_prereqs = ["tools/version.txt"]
//!
//! [targets.default]
//! description = "Build everything"
//! prereqs = ["out/app"]
//!
//! [targets."out/app"]
//! prereqs = ["src"]
//! cmd = ["cc", "-o", "out/app", "src/main.c"]
//! ```
//!
//! The Buildfile itself is always a global prerequisite, so editing it
//! invalidates every target.
//!
//! A target with `cwd` runs its command in that directory, while names in
//! the Buildfile stay relative to the invoking directory. Commands should
//! refer to their output through `$TMAKE_TARGET`, which is absolute.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::builder::Builder;
use crate::error::{BuildError, Result};
use crate::process::{Command, ProcessOptions};
use crate::registry::TargetRegistry;
use crate::target::Target;

pub const DEFAULT_BUILDFILE: &str = "Buildfile.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Buildfile {
  /// Extra prerequisites of every target.
  #[serde(default)]
  pub global_prereqs: Vec<String>,

  #[serde(default)]
  pub targets: BTreeMap<String, TargetSpec>,
}

/// One `[targets."name"]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
  pub description: Option<String>,

  #[serde(default)]
  pub prereqs: Vec<String>,

  /// Program and arguments to run.
  pub cmd: Option<Vec<String>>,

  /// Line to run through the system shell.
  pub shell: Option<String>,

  /// Working directory of the command. Target and prerequisite names stay
  /// relative to where tmake runs; `$TMAKE_TARGET` and `$TMAKE_PREREQS`
  /// carry their absolute paths.
  pub cwd: Option<PathBuf>,

  #[serde(default)]
  pub silent: bool,

  #[serde(default)]
  pub is_directory: bool,

  #[serde(default)]
  pub keep_on_failure: bool,
}

impl TargetSpec {
  fn command(&self) -> std::result::Result<Option<Command>, String> {
    match (&self.cmd, &self.shell) {
      (Some(_), Some(_)) => Err("`cmd` and `shell` are mutually exclusive".to_string()),
      (Some(argv), None) if argv.is_empty() => Err("`cmd` must not be empty".to_string()),
      (Some(argv), None) => Ok(Some(Command::Argv(argv.clone()))),
      (None, Some(line)) => Ok(Some(Command::Shell(line.clone()))),
      (None, None) => Ok(None),
    }
  }

  fn to_target(&self) -> std::result::Result<Target, String> {
    let mut target = Target::new().prereqs(self.prereqs.iter().cloned());
    target.description = self.description.clone();
    target.is_directory = self.is_directory;
    target.keep_on_failure = self.keep_on_failure;

    if let Some(command) = self.command()? {
      let options = ProcessOptions {
        silent: self.silent,
        cwd: self.cwd.clone(),
        ..ProcessOptions::default()
      };
      target = target.command(command, options);
    }
    Ok(target)
  }
}

impl Buildfile {
  /// Parses a Buildfile from TOML source. `path` is only used in errors.
  pub fn parse(source: &str, path: &Path) -> Result<Self> {
    let buildfile: Buildfile = toml::from_str(source).map_err(|e| BuildError::Buildfile {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    buildfile.validate(path)?;
    Ok(buildfile)
  }

  pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let source = tokio::fs::read_to_string(path).await.map_err(|e| BuildError::Buildfile {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    let buildfile = Self::parse(&source, path)?;
    debug!(path = %path.display(), targets = buildfile.targets.len(), "loaded buildfile");
    Ok(buildfile)
  }

  fn validate(&self, path: &Path) -> Result<()> {
    for (name, spec) in &self.targets {
      if name.is_empty() {
        return Err(BuildError::Buildfile {
          path: path.to_path_buf(),
          message: "target names must not be empty".to_string(),
        });
      }
      spec.command().map_err(|message| BuildError::Buildfile {
        path: path.to_path_buf(),
        message: format!("target {name}: {message}"),
      })?;
    }
    Ok(())
  }

  pub fn to_registry(&self, path: &Path) -> Result<TargetRegistry> {
    let mut registry = TargetRegistry::new();
    for (name, spec) in &self.targets {
      let target = spec.to_target().map_err(|message| BuildError::Buildfile {
        path: path.to_path_buf(),
        message: format!("target {name}: {message}"),
      })?;
      registry.insert(name.clone(), target);
    }
    Ok(registry)
  }

  /// Creates a builder for this Buildfile, which was loaded from `path`.
  pub fn into_builder(self, path: &Path) -> Result<Builder> {
    let registry = self.to_registry(path)?;
    let mut global_prereqs = vec![path.to_string_lossy().replace('\\', "/")];
    global_prereqs.extend(self.global_prereqs);
    Ok(Builder::with_global_prereqs(registry, global_prereqs))
  }
}
