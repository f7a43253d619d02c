use std::path::Path;

use anyhow::Result;

use tmake_lib::{Invocation, Operation, Outcome};

pub fn cmd_list(file: &Path) -> Result<()> {
  let invocation = Invocation {
    operation: Operation::ListTargets,
    ..Invocation::default()
  };

  let outcome = super::runtime()?.block_on(async {
    let builder = super::load_builder(file).await?;
    invocation.run(&builder).await.map_err(anyhow::Error::from)
  })?;

  if let Outcome::Listed(names) = outcome {
    for name in names {
      println!("{name}");
    }
  }

  Ok(())
}
