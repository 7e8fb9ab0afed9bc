//! Shared vocabulary for deferred values.
//!
//! This crate provides the types every other component agrees on: the
//! lifecycle tag of a deferred value, the shape of a settled outcome, and the
//! error produced when caller code panics inside a deferred value.
//!
//! # Overview
//!
//! - [`DeferredState`] - Pending, fulfilled or rejected
//! - [`Settlement`] - A settled outcome carrying its value or reason
//! - [`Panicked`] - A panic caught at an invocation boundary
//! - [`Boundary`] - Which boundary the panic crossed
//!
//! # Examples
//!
//! ```
//! use core_types::{Boundary, DeferredState, Panicked, Settlement};
//!
//! let outcome: Settlement<u32, String> = Settlement::Rejected("boom".to_string());
//! assert_eq!(outcome.state(), DeferredState::Rejected);
//!
//! let failure = Panicked::new(Boundary::Executor, "oops");
//! assert_eq!(failure.boundary, Boundary::Executor);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod state;

pub use error::{Boundary, Panicked};
pub use state::{DeferredState, Settlement};
