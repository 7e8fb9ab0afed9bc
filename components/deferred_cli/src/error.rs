//! Error types for the CLI

use async_runtime::LoopError;
use core_types::Panicked;

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The event loop stopped before the pipeline finished
    #[error("event loop error: {0}")]
    Loop(#[from] LoopError),

    /// The tracing subscriber could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Why the file pipeline rejected.
///
/// This is the rejection type carried along the deferred chain, so it is
/// cheap to clone and absorbs panics from any stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The input file could not be read
    #[error("could not read '{path}': {message}")]
    Read {
        /// The path that was requested
        path: String,
        /// The underlying I/O error
        message: String,
    },

    /// A pipeline stage panicked
    #[error(transparent)]
    Panicked(#[from] Panicked),
}

impl PipelineError {
    /// Builds a read error from an I/O failure.
    pub fn read(path: &std::path::Path, err: &std::io::Error) -> Self {
        PipelineError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
