//! Deferred values and the event loop that drives them.
//!
//! This crate provides:
//! - [`Deferred`] - a value or failure that becomes available later, with
//!   `then`/`catch`/`finally` chaining and thenable flattening
//! - [`Thenable`] - the capability a value needs to be adopted by a chain
//! - [`Scheduler`] - the injected "run this later" capability
//! - [`EventLoop`] - task, microtask and timer queues plus background jobs
//!
//! # Examples
//!
//! ## Chaining
//!
//! ```
//! use async_runtime::{Deferred, EventLoop};
//!
//! let mut event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let length = Deferred::<usize, String>::rejected(&scheduler, "boom".to_string())
//!     .catch(|reason| Ok(reason.len()));
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(length.value(), Some(4));
//! ```
//!
//! ## Background work
//!
//! ```
//! use async_runtime::EventLoop;
//! use std::time::Duration;
//!
//! let mut event_loop = EventLoop::new();
//! let handle = event_loop.handle();
//!
//! let sum = handle
//!     .spawn_blocking(|| Ok::<_, String>(2 + 2))
//!     .then(move |n| handle.delay::<_, String>(Duration::from_millis(1), n * 10));
//!
//! let outcome = event_loop.run_until_settled(&sum).unwrap();
//! assert_eq!(outcome.into_result(), Ok(40));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod deferred;
pub mod error;
pub mod event_loop;
pub mod scheduler;
pub mod task_queue;
pub mod thenable;

// Re-export main types at crate root
pub use config::LoopConfig;
pub use deferred::{Deferred, Settle};
pub use error::LoopError;
pub use event_loop::{EventLoop, LoopHandle};
pub use scheduler::{Scheduler, SharedScheduler};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue, TimerQueue};
pub use thenable::{Callback, IntoResolution, Resolution, Thenable};
