//! Error types for target resolution and building.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while resolving or building targets.
///
/// Every requester of a memoized build observes the same outcome, so this
/// type is `Clone`; I/O sources are shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
  /// No rule exists for the target and no file or directory of that name exists.
  #[error("{target} does not exist and I don't know how to build it")]
  MissingRule { target: String },

  /// Reading a modification time failed for a reason other than not-found.
  #[error("failed to stat {}: {source}", .path.display())]
  Stat {
    path: PathBuf,
    #[source]
    source: Arc<io::Error>,
  },

  /// The path is neither a regular file nor a directory.
  #[error("{} is neither a regular file nor a directory", .path.display())]
  UnsupportedFileType { path: PathBuf },

  /// A target depends on itself, directly or through other targets.
  #[error("dependency cycle detected: {}", .trace.join(" > "))]
  Cycle { trace: Vec<String> },

  /// A target's build action failed.
  #[error("failed to build {target}: {source}")]
  ActionFailed {
    target: String,
    trace: Vec<String>,
    #[source]
    source: Box<BuildError>,
  },

  /// An external process exited with a non-zero status.
  #[error("process exited with code {}: {command}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
  CommandFailed { command: String, code: Option<i32> },

  /// An external process could not be started.
  #[error("failed to spawn {command}: {source}")]
  Spawn {
    command: String,
    #[source]
    source: Arc<io::Error>,
  },

  /// Any other filesystem failure.
  #[error("io error on {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: Arc<io::Error>,
  },

  /// The Buildfile could not be read, parsed or validated.
  #[error("invalid buildfile {}: {message}", .path.display())]
  Buildfile { path: PathBuf, message: String },

  /// Free-form failure raised by an in-process action.
  #[error("{0}")]
  Message(String),
}

impl BuildError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    BuildError::Io {
      path: path.into(),
      source: Arc::new(source),
    }
  }

  /// Returns the dependency path that led to this failure, if one was recorded.
  pub fn trace(&self) -> Option<&[String]> {
    match self {
      BuildError::ActionFailed { trace, .. } | BuildError::Cycle { trace } => Some(trace),
      _ => None,
    }
  }
}

impl From<String> for BuildError {
  fn from(message: String) -> Self {
    BuildError::Message(message)
  }
}

impl From<&str> for BuildError {
  fn from(message: &str) -> Self {
    BuildError::Message(message.to_string())
  }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
