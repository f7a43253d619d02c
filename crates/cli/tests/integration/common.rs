//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use filetime::FileTime;
use tempfile::TempDir;

/// Isolated project directory holding a Buildfile and its sources.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create a project whose Buildfile has `content`, dated well in the past
  /// so that freshly built artifacts are never older than it.
  pub fn with_buildfile(content: &str) -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("Buildfile.toml", content);
    env.set_mtime("Buildfile.toml", 1_000_000);
    env
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.path(relative_path)).unwrap()
  }

  pub fn set_mtime(&self, relative_path: &str, unix_secs: i64) {
    let time = FileTime::from_unix_time(unix_secs, 0);
    filetime::set_file_times(self.path(relative_path), time, time).unwrap();
  }

  /// Number of lines in a log file that build commands append to.
  pub fn runs(&self, log: &str) -> usize {
    std::fs::read_to_string(self.path(log))
      .map(|content| content.lines().count())
      .unwrap_or(0)
  }

  /// A tmake command running inside the project directory.
  pub fn tmake(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("tmake");
    cmd.current_dir(self.temp.path());
    cmd
  }
}
