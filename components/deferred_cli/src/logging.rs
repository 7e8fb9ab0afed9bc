//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence; otherwise each `-v` raises the default level
//! one step from `warn`.

use crate::error::{CliError, CliResult};
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The filter directive used when `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber, logging to stderr.
pub fn init(verbosity: u8) -> CliResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbosity)))
        .map_err(|err| CliError::Logging(err.to_string()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(env_filter)
        .try_init()
        .map_err(|err| CliError::Logging(err.to_string()))
}
