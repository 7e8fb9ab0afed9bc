//! Lifecycle states and settled outcomes of deferred values.
//!
//! A deferred value starts out pending and settles exactly once, either
//! fulfilled with a value or rejected with a reason.

use std::fmt;

/// The lifecycle tag of a deferred value.
///
/// Transitions are one way: `Pending -> Fulfilled` or `Pending -> Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredState {
    /// Not yet settled.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a rejection reason.
    Rejected,
}

impl DeferredState {
    /// Returns `true` while the value has not settled.
    pub fn is_pending(self) -> bool {
        matches!(self, DeferredState::Pending)
    }

    /// Returns `true` once the value is fulfilled or rejected.
    pub fn is_settled(self) -> bool {
        !self.is_pending()
    }
}

impl fmt::Display for DeferredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredState::Pending => f.write_str("pending"),
            DeferredState::Fulfilled => f.write_str("fulfilled"),
            DeferredState::Rejected => f.write_str("rejected"),
        }
    }
}

/// The outcome of a settled deferred value.
///
/// Holding the payload inside the variant means a settled value always
/// carries exactly one of value or reason, matching its state.
///
/// # Examples
///
/// ```
/// use core_types::{DeferredState, Settlement};
///
/// let outcome: Settlement<i32, String> = Settlement::Fulfilled(6);
/// assert_eq!(outcome.state(), DeferredState::Fulfilled);
/// assert_eq!(outcome.into_result(), Ok(6));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    /// Fulfilled with a value.
    Fulfilled(T),
    /// Rejected with a reason.
    Rejected(E),
}

impl<T, E> Settlement<T, E> {
    /// The state tag matching this outcome.
    pub fn state(&self) -> DeferredState {
        match self {
            Settlement::Fulfilled(_) => DeferredState::Fulfilled,
            Settlement::Rejected(_) => DeferredState::Rejected,
        }
    }

    /// Returns `true` for a fulfilled outcome.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settlement::Fulfilled(_))
    }

    /// Returns `true` for a rejected outcome.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Settlement::Rejected(_))
    }

    /// The fulfillment value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Settlement::Fulfilled(value) => Some(value),
            Settlement::Rejected(_) => None,
        }
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&E> {
        match self {
            Settlement::Fulfilled(_) => None,
            Settlement::Rejected(reason) => Some(reason),
        }
    }

    /// Converts into a `Result`, fulfilled values becoming `Ok`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settlement::Fulfilled(value) => Ok(value),
            Settlement::Rejected(reason) => Err(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settlement<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settlement::Fulfilled(value),
            Err(reason) => Settlement::Rejected(reason),
        }
    }
}
