use std::path::Path;

use anyhow::Result;

use tmake_lib::{Invocation, Operation, Outcome};

/// Prints `name ; description` for every known target.
pub fn cmd_describe(file: &Path) -> Result<()> {
  let invocation = Invocation {
    operation: Operation::DescribeTargets,
    ..Invocation::default()
  };

  let outcome = super::runtime()?.block_on(async {
    let builder = super::load_builder(file).await?;
    invocation.run(&builder).await.map_err(anyhow::Error::from)
  })?;

  if let Outcome::Described(targets) = outcome {
    for target in targets {
      println!("{target}");
    }
  }

  Ok(())
}
