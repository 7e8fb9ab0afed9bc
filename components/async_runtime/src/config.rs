//! Event loop configuration.

use std::time::Duration;

/// Limits applied by [`EventLoop`](crate::EventLoop) while it runs.
///
/// # Examples
///
/// ```
/// use async_runtime::LoopConfig;
/// use std::time::Duration;
///
/// let config = LoopConfig::new()
///     .with_max_steps(10_000)
///     .with_idle_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_steps, Some(10_000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopConfig {
    /// Maximum number of tasks and microtasks one run may execute. The
    /// count restarts on every `run_*` and `process_one_cycle` call.
    /// `None` means unlimited.
    pub max_steps: Option<usize>,
    /// How long to wait for a background job to complete before giving up.
    /// `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl LoopConfig {
    /// Creates a configuration with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of tasks and microtasks one run may execute.
    pub fn with_max_steps(mut self, limit: usize) -> Self {
        self.max_steps = Some(limit);
        self
    }

    /// Bounds how long the loop waits on background jobs alone.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}
