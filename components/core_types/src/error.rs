//! Failures raised at the invocation boundaries of a deferred value.
//!
//! Executors, continuations and cleanup callbacks are caller code. When one
//! of them panics the panic is caught where the deferred value invokes it and
//! turned into a [`Panicked`] error, which the rejection type must be able to
//! absorb through `From<Panicked>`.

use std::any::Any;
use std::fmt;

/// Where a caught panic originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// The construction callback passed to a deferred value.
    Executor,
    /// A fulfillment or rejection handler registered with `then`/`catch`.
    Continuation,
    /// A side effect registered with `finally`.
    Cleanup,
    /// A foreign thenable's subscription method.
    Subscription,
    /// A background job started by the event loop.
    Job,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Boundary::Executor => "executor",
            Boundary::Continuation => "continuation",
            Boundary::Cleanup => "cleanup callback",
            Boundary::Subscription => "thenable subscription",
            Boundary::Job => "background job",
        };
        f.write_str(name)
    }
}

/// A panic caught at a deferred value's invocation boundary.
///
/// # Examples
///
/// ```
/// use core_types::{Boundary, Panicked};
///
/// let failure = Panicked::new(Boundary::Continuation, "index out of bounds");
/// assert_eq!(failure.to_string(), "continuation panicked: index out of bounds");
///
/// let reason: String = failure.into();
/// assert!(reason.contains("index out of bounds"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{boundary} panicked: {message}")]
pub struct Panicked {
    /// The boundary the panic crossed.
    pub boundary: Boundary,
    /// The panic message, when the payload carried one.
    pub message: String,
}

impl Panicked {
    /// Creates a failure with an explicit message.
    pub fn new(boundary: Boundary, message: impl Into<String>) -> Self {
        Self {
            boundary,
            message: message.into(),
        }
    }

    /// Builds a failure from the payload returned by `std::panic::catch_unwind`.
    pub fn from_payload(boundary: Boundary, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { boundary, message }
    }
}

impl From<Panicked> for String {
    fn from(failure: Panicked) -> Self {
        failure.to_string()
    }
}
