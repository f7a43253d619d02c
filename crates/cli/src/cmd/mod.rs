mod build;
mod describe;
mod list;

pub use build::cmd_build;
pub use describe::cmd_describe;
pub use list::cmd_list;

use std::path::Path;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use tmake_lib::{Buildfile, Builder};

/// Loads the Buildfile at `file` and creates a builder for it.
async fn load_builder(file: &Path) -> Result<Builder> {
  let buildfile = Buildfile::load(file).await?;
  Ok(buildfile.into_builder(file)?)
}

fn runtime() -> Result<Runtime> {
  Runtime::new().context("Failed to create async runtime")
}
