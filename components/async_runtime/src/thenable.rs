//! The thenable capability and what continuations hand back.
//!
//! Any value exposing [`Thenable`] is treated as a deferred value when a
//! continuation returns it: instead of becoming the child's value it is
//! subscribed to, and the child settles with whatever it settles with.

use std::fmt;

/// A one-shot callback receiving a value or a reason.
pub type Callback<A> = Box<dyn FnOnce(A) + Send>;

/// A value that will eventually deliver `T` or fail with `E`.
///
/// `subscribe` must call at most one of the callbacks, at most once. Calling
/// them synchronously from inside `subscribe` is allowed.
pub trait Thenable<T, E>: Send {
    /// Registers the callbacks to run when the value settles.
    fn subscribe(self: Box<Self>, on_fulfilled: Callback<T>, on_rejected: Callback<E>);
}

/// What a continuation produced.
pub enum Resolution<T, E> {
    /// A plain value; the child fulfills with it.
    Fulfilled(T),
    /// A failure; the child rejects with it.
    Rejected(E),
    /// Another deferred value; the child adopts its outcome.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Wraps any thenable for adoption.
    pub fn adopt<H>(thenable: H) -> Self
    where
        H: Thenable<T, E> + 'static,
    {
        Resolution::Thenable(Box::new(thenable))
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Fulfilled(value) => f.debug_tuple("Fulfilled").field(value).finish(),
            Resolution::Rejected(reason) => f.debug_tuple("Rejected").field(reason).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// Conversion into a [`Resolution`].
///
/// Continuations may return a `Result` (value or failure), a `Resolution`,
/// or a [`Deferred`](crate::Deferred), which is flattened.
pub trait IntoResolution<T, E> {
    /// Performs the conversion.
    fn into_resolution(self) -> Resolution<T, E>;
}

impl<T, E> IntoResolution<T, E> for Resolution<T, E> {
    fn into_resolution(self) -> Resolution<T, E> {
        self
    }
}

impl<T, E> IntoResolution<T, E> for Result<T, E> {
    fn into_resolution(self) -> Resolution<T, E> {
        match self {
            Ok(value) => Resolution::Fulfilled(value),
            Err(reason) => Resolution::Rejected(reason),
        }
    }
}
