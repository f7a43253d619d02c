//! Implementation of the default build operation.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::debug;

use tmake_lib::{Invocation, Outcome};

use crate::output::{format_duration, print_error, print_stat, print_success};

/// Builds the requested targets and prints a summary.
///
/// Returns `Ok(false)` if any requested target failed; each failure is
/// printed with the dependency trace that led to it.
pub fn cmd_build(file: &Path, invocation: &Invocation) -> Result<bool> {
  let start = Instant::now();

  let outcome = super::runtime()?.block_on(async {
    let builder = super::load_builder(file).await?;
    invocation.run(&builder).await.map_err(anyhow::Error::from)
  })?;

  let Outcome::Built(report) = outcome else {
    return Ok(true);
  };

  for (name, err) in &report.failed {
    print_error(&format!("{name}: {err}"));
    if let Some(trace) = err.trace() {
      print_stat("Error trace", &trace.join(" > "));
    }
  }

  if report.is_success() {
    debug!(targets = report.succeeded.len(), "build completed");
    if invocation.verbose {
      print_success(&format!("Build completed in {}", format_duration(start.elapsed())));
    }
    Ok(true)
  } else {
    print_error("Build failed!");
    Ok(false)
  }
}
