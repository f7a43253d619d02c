//! tmake-lib: incremental builds driven by modification times.
//!
//! This crate provides the pieces of the `tmake` build tool:
//! - `Target`: a named rule with prerequisites and an optional action
//! - `TargetRegistry`: static rules plus an optional generator, fetched once
//! - `Builder`: the resolver that rebuilds only what is stale
//! - `Buildfile`: declarative TOML build descriptions
//! - `Invocation`: command-line operations over a builder

pub mod builder;
pub mod buildfile;
pub mod error;
pub mod fs;
pub mod invocation;
pub mod process;
pub mod registry;
pub mod target;

pub use builder::Builder;
pub use buildfile::{Buildfile, DEFAULT_BUILDFILE};
pub use error::{BuildError, Result};
pub use invocation::{BuildReport, Invocation, Operation, Outcome};
pub use process::{Command, OnNonZero, ProcessOptions, ProcessRunner};
pub use registry::TargetRegistry;
pub use target::{BuildContext, Target, TargetLookup};
