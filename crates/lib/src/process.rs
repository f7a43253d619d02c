//! External process execution for build actions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tracing::debug;

use crate::error::{BuildError, Result};

/// A command to run: either an argument vector or a line for the system shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Argv(Vec<String>),
  Shell(String),
}

impl Command {
  pub fn argv<I, S>(args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Command::Argv(args.into_iter().map(Into::into).collect())
  }

  pub fn shell(line: impl Into<String>) -> Self {
    Command::Shell(line.into())
  }

  /// Expands to the program and arguments that will actually be spawned.
  fn to_argv(&self) -> Vec<String> {
    match self {
      Command::Argv(args) => args.clone(),
      Command::Shell(line) => {
        let (shell, mut args) = get_shell();
        args.push(line.clone());
        let mut argv = vec![shell];
        argv.extend(args);
        argv
      }
    }
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Command::Argv(args) => f.write_str(&args_to_shell_command(args)),
      Command::Shell(line) => f.write_str(line),
    }
  }
}

/// What to do when a process exits with a non-zero status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnNonZero {
  /// Fail with [`BuildError::CommandFailed`].
  #[default]
  Error,
  /// Return the exit code to the caller.
  Return,
}

/// Options for running an external process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
  /// Discard the process's stdout and stderr instead of inheriting them.
  pub silent: bool,
  /// Working directory; defaults to the current one.
  pub cwd: Option<PathBuf>,
  pub on_non_zero: OnNonZero,
  /// Extra environment variables.
  pub env: BTreeMap<String, String>,
}

impl ProcessOptions {
  pub fn silent() -> Self {
    Self {
      silent: true,
      ..Self::default()
    }
  }
}

/// Spawns external processes on behalf of build actions.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
  pub fn new() -> Self {
    Self
  }

  /// Runs `command` to completion and returns its exit code.
  ///
  /// A non-zero exit is an error unless `options.on_non_zero` is
  /// [`OnNonZero::Return`]. A process killed by a signal reports `-1`.
  pub async fn run(&self, command: &Command, options: &ProcessOptions) -> Result<i32> {
    let argv = command.to_argv();
    let shown = command.to_string();
    let Some((program, args)) = argv.split_first() else {
      return Err(BuildError::Message("cannot run an empty command".to_string()));
    };

    debug!("+ {}", shown);

    let mut process = tokio::process::Command::new(program);
    process.args(args).envs(&options.env);
    if let Some(cwd) = &options.cwd {
      process.current_dir(cwd);
    }
    if options.silent {
      process.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    } else {
      process.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    let status = process.status().await.map_err(|e| BuildError::Spawn {
      command: shown.clone(),
      source: Arc::new(e),
    })?;

    match status.code() {
      Some(0) => Ok(0),
      code if options.on_non_zero == OnNonZero::Return => Ok(code.unwrap_or(-1)),
      code => Err(BuildError::CommandFailed { command: shown, code }),
    }
  }
}

/// Renders an argument vector as a shell-like line for humans to read.
///
/// The quoting is not meant to be fed back into a shell.
pub fn args_to_shell_command<S: AsRef<str>>(args: &[S]) -> String {
  args
    .iter()
    .map(|arg| {
      let arg = arg.as_ref();
      let plain = !arg.is_empty()
        && arg
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '+' | '_' | '-'));
      if plain {
        arg.to_string()
      } else {
        let mut escaped = String::with_capacity(arg.len() + 2);
        escaped.push('"');
        for c in arg.chars() {
          if matches!(c, '"' | '$' | '\\') {
            escaped.push('\\');
          }
          escaped.push(c);
        }
        escaped.push('"');
        escaped
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

/// Get the shell command and argument for the current platform.
fn get_shell() -> (String, Vec<String>) {
  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}
