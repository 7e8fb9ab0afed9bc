//! Deferred value demo CLI library
//!
//! Provides the Runtime that drives the file pipeline, plus argument parsing,
//! logging setup and the console transcript used by tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod console;
pub mod error;
pub mod logging;
pub mod runtime;

pub use cli::Cli;
pub use console::{Console, Line};
pub use error::{CliError, CliResult, PipelineError};
pub use runtime::{strip_vowels, Runtime};
