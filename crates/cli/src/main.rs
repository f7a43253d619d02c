mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tmake_lib::invocation::normalize_target_name;
use tmake_lib::{DEFAULT_BUILDFILE, Invocation, Operation};

use crate::cmd::{cmd_build, cmd_describe, cmd_list};
use crate::output::print_error;

/// tmake - rebuild only what is stale
#[derive(Parser)]
#[command(name = "tmake")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Targets to build (default: "default")
  targets: Vec<String>,

  /// Print the name of every known target
  #[arg(long, conflicts_with = "describe_targets")]
  list_targets: bool,

  /// Print every known target with its description
  #[arg(long)]
  describe_targets: bool,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,

  /// Path to the Buildfile
  #[arg(short, long, default_value = DEFAULT_BUILDFILE)]
  file: PathBuf,
}

impl Cli {
  fn invocation(&self) -> Invocation {
    let operation = if self.list_targets {
      Operation::ListTargets
    } else if self.describe_targets {
      Operation::DescribeTargets
    } else {
      Operation::Build
    };

    Invocation {
      operation,
      targets: self.targets.iter().map(|t| normalize_target_name(t)).collect(),
      verbose: self.verbose,
    }
  }
}

fn init_tracing(verbose: bool) {
  let default_level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let invocation = cli.invocation();
  let result = match invocation.operation {
    Operation::Build => cmd_build(&cli.file, &invocation),
    Operation::ListTargets => cmd_list(&cli.file).map(|()| true),
    Operation::DescribeTargets => cmd_describe(&cli.file).map(|()| true),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
