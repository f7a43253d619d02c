//! Filesystem primitives used by the engine and by build actions.
//!
//! Everything here is async so the engine can suspend on every lookup
//! instead of blocking the logical thread.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use filetime::FileTime;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use tracing::debug;

use crate::error::{BuildError, Result};

fn stat_error(path: &Path, source: io::Error) -> BuildError {
  BuildError::Stat {
    path: path.to_path_buf(),
    source: Arc::new(source),
  }
}

/// Returns the most recent modification time found anywhere under `path`.
///
/// Files report their own mtime, directories the maximum of their own mtime
/// and that of everything beneath them. A path that does not exist yields
/// `None`; entries that vanish mid-walk are ignored.
pub fn mtime_recursive(path: impl AsRef<Path>) -> BoxFuture<'static, Result<Option<SystemTime>>> {
  let path = path.as_ref().to_path_buf();
  async move {
    let metadata = match tokio::fs::metadata(&path).await {
      Ok(metadata) => metadata,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(stat_error(&path, e)),
    };
    let own = metadata.modified().map_err(|e| stat_error(&path, e))?;

    if metadata.is_file() {
      return Ok(Some(own));
    }
    if !metadata.is_dir() {
      return Err(BuildError::UnsupportedFileType { path });
    }

    let mut entries = match tokio::fs::read_dir(&path).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(stat_error(&path, e)),
    };
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| stat_error(&path, e))? {
      children.push(mtime_recursive(entry.path()));
    }

    let latest = try_join_all(children).await?.into_iter().flatten().fold(own, SystemTime::max);
    Ok(Some(latest))
  }
  .boxed()
}

/// Returns true if something exists at `path`.
pub async fn exists(path: impl AsRef<Path>) -> bool {
  tokio::fs::metadata(path.as_ref()).await.is_ok()
}

/// Removes a file or an entire directory tree. A missing path is not an error.
pub async fn remove_recursive(path: impl AsRef<Path>) -> Result<()> {
  let path = path.as_ref();
  let metadata = match tokio::fs::symlink_metadata(path).await {
    Ok(metadata) => metadata,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(BuildError::io(path, e)),
  };

  debug!(path = %path.display(), "removing");
  let result = if metadata.is_dir() {
    tokio::fs::remove_dir_all(path).await
  } else {
    tokio::fs::remove_file(path).await
  };

  match result {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(BuildError::io(path, e)),
  }
}

/// Removes every path in `paths`, concurrently.
pub async fn remove_all<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
  try_join_all(paths.iter().map(remove_recursive)).await?;
  Ok(())
}

/// Creates `dir` and any missing parents. An empty path is a no-op.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
  let dir = dir.as_ref();
  if dir.as_os_str().is_empty() {
    return Ok(());
  }
  tokio::fs::create_dir_all(dir).await.map_err(|e| BuildError::io(dir, e))
}

/// Creates the directory that will contain `file`.
pub async fn ensure_parent_dirs(file: impl AsRef<Path>) -> Result<()> {
  match file.as_ref().parent() {
    Some(parent) => ensure_dir(parent).await,
    None => Ok(()),
  }
}

/// Sets the access and modification times of `path` to now.
pub async fn touch(path: impl AsRef<Path>) -> Result<()> {
  let path = path.as_ref().to_path_buf();
  debug!(path = %path.display(), "touching");
  let target = path.clone();
  tokio::task::spawn_blocking(move || {
    let now = FileTime::now();
    filetime::set_file_times(&target, now, now)
  })
  .await
  .map_err(|e| BuildError::io(&path, io::Error::other(e)))?
  .map_err(|e| BuildError::io(&path, e))
}

/// Copies a file or directory tree from `src` to `dest`.
pub fn copy_recursive(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> BoxFuture<'static, Result<()>> {
  let src = src.as_ref().to_path_buf();
  let dest = dest.as_ref().to_path_buf();
  async move {
    let metadata = tokio::fs::metadata(&src).await.map_err(|e| BuildError::io(&src, e))?;
    if !metadata.is_dir() {
      tokio::fs::copy(&src, &dest).await.map_err(|e| BuildError::io(&dest, e))?;
      return Ok(());
    }

    match tokio::fs::create_dir(&dest).await {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
      Err(e) => return Err(BuildError::io(&dest, e)),
    }

    let mut entries = tokio::fs::read_dir(&src).await.map_err(|e| BuildError::io(&src, e))?;
    let mut copies = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| BuildError::io(&src, e))? {
      copies.push(copy_recursive(entry.path(), dest.join(entry.file_name())));
    }
    try_join_all(copies).await?;
    Ok(())
  }
  .boxed()
}

/// Removes `dest` and then copies `src` into its place.
pub async fn copy_recursive_replacing(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
  let dest: PathBuf = dest.as_ref().to_path_buf();
  remove_recursive(&dest).await?;
  copy_recursive(src, dest).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tempfile::TempDir;

  fn set_mtime(path: &Path, secs: i64) {
    let time = FileTime::from_unix_time(secs, 0);
    filetime::set_file_times(path, time, time).unwrap();
  }

  #[tokio::test]
  async fn mtime_of_missing_path_is_none() {
    let temp = TempDir::new().unwrap();
    let mtime = mtime_recursive(temp.path().join("nope")).await.unwrap();
    assert!(mtime.is_none());
  }

  #[tokio::test]
  async fn mtime_of_file_is_its_own() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.txt");
    std::fs::write(&file, "a").unwrap();
    set_mtime(&file, 1_000_000);

    let mtime = mtime_recursive(&file).await.unwrap().unwrap();
    assert_eq!(mtime, SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn mtime_of_fifo_is_unsupported() {
    let temp = TempDir::new().unwrap();
    let fifo = temp.path().join("pipe");
    let made = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(made.success());

    let err = mtime_recursive(&fifo).await.unwrap_err();
    assert!(matches!(err, BuildError::UnsupportedFileType { ref path } if *path == fifo));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn mtime_below_a_file_is_a_stat_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.txt");
    std::fs::write(&file, "a").unwrap();
    let below = file.join("child");

    let err = mtime_recursive(&below).await.unwrap_err();
    assert!(matches!(err, BuildError::Stat { ref path, .. } if *path == below));
  }

  #[tokio::test]
  async fn mtime_of_directory_is_newest_descendant() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("tree");
    let nested = dir.join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("deep.txt"), "x").unwrap();
    std::fs::write(dir.join("shallow.txt"), "y").unwrap();

    set_mtime(&nested.join("deep.txt"), 3_000_000);
    set_mtime(&dir.join("shallow.txt"), 2_000_000);
    set_mtime(&nested, 1_000_000);
    set_mtime(&dir.join("a"), 1_000_000);
    set_mtime(&dir, 1_000_000);

    let mtime = mtime_recursive(&dir).await.unwrap().unwrap();
    assert_eq!(mtime, SystemTime::UNIX_EPOCH + Duration::from_secs(3_000_000));
  }

  #[tokio::test]
  async fn mtime_of_directory_uses_own_time_when_newest() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("tree");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("old.txt"), "x").unwrap();
    set_mtime(&dir.join("old.txt"), 1_000_000);
    set_mtime(&dir, 5_000_000);

    let mtime = mtime_recursive(&dir).await.unwrap().unwrap();
    assert_eq!(mtime, SystemTime::UNIX_EPOCH + Duration::from_secs(5_000_000));
  }

  #[tokio::test]
  async fn remove_recursive_removes_tree_and_ignores_missing() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("gone");
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    std::fs::write(dir.join("sub").join("f"), "x").unwrap();

    remove_recursive(&dir).await.unwrap();
    assert!(!dir.exists());

    remove_recursive(&dir).await.unwrap();
  }

  #[tokio::test]
  async fn remove_all_removes_files_and_dirs() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("f");
    let dir = temp.path().join("d");
    std::fs::write(&file, "x").unwrap();
    std::fs::create_dir(&dir).unwrap();

    remove_all(&[&file, &dir]).await.unwrap();
    assert!(!file.exists());
    assert!(!dir.exists());
  }

  #[tokio::test]
  async fn ensure_dir_creates_nested_paths() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("x").join("y").join("z");

    ensure_dir(&dir).await.unwrap();
    ensure_dir(&dir).await.unwrap();
    ensure_dir("").await.unwrap();

    assert!(dir.is_dir());
  }

  #[tokio::test]
  async fn ensure_parent_dirs_creates_only_parent() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("out").join("bin").join("app");

    ensure_parent_dirs(&file).await.unwrap();

    assert!(file.parent().unwrap().is_dir());
    assert!(!file.exists());
  }

  #[tokio::test]
  async fn touch_moves_mtime_forward() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("d");
    std::fs::create_dir(&dir).unwrap();
    set_mtime(&dir, 1_000_000);

    let before = SystemTime::now() - Duration::from_secs(2);
    touch(&dir).await.unwrap();

    let mtime = mtime_recursive(&dir).await.unwrap().unwrap();
    assert!(mtime >= before);
  }

  #[tokio::test]
  async fn copy_recursive_replacing_copies_tree() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let dest = temp.path().join("dest");
    std::fs::create_dir_all(src.join("inner")).unwrap();
    std::fs::write(src.join("inner").join("f.txt"), "hello").unwrap();
    std::fs::create_dir(&dest).unwrap();
    std::fs::write(dest.join("stale.txt"), "old").unwrap();

    copy_recursive_replacing(&src, &dest).await.unwrap();

    assert_eq!(std::fs::read_to_string(dest.join("inner").join("f.txt")).unwrap(), "hello");
    assert!(!dest.join("stale.txt").exists());
  }

  #[tokio::test]
  async fn exists_reports_presence() {
    let temp = TempDir::new().unwrap();
    assert!(exists(temp.path()).await);
    assert!(!exists(temp.path().join("missing")).await);
  }
}
