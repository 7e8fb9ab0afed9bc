//! Errors reported by the event loop itself.
//!
//! Failures inside deferred values never surface here; they become
//! rejections. These errors describe the loop failing to make progress.

use std::time::Duration;

/// Why an event loop run stopped early.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoopError {
    /// The configured step budget was used up.
    #[error("event loop exceeded its limit of {limit} steps")]
    StepLimitExceeded {
        /// The configured limit.
        limit: usize,
    },
    /// The loop ran out of work while the awaited value was still pending.
    #[error("event loop ran out of work before the deferred value settled")]
    Stalled,
    /// No background job completed within the configured idle timeout.
    #[error("no background job completed within {0:?}")]
    IdleTimeout(Duration),
}
