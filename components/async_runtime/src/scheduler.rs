//! The "run this later" capability consumed by deferred values.
//!
//! Deferred values never call back into user code from the frame that
//! settled or subscribed to them. Instead they hand work to a [`Scheduler`],
//! which is injected at construction time and inherited by every child.

use std::sync::Arc;

use crate::task_queue::{MicroTask, Task};

/// Something that can run tasks after the current call stack unwinds.
///
/// The event loop's [`LoopHandle`](crate::LoopHandle) is the stock
/// implementation. Implementations must not run the task inline.
pub trait Scheduler: Send + Sync {
    /// Queues a task.
    fn schedule_task(&self, task: Task);

    /// Queues a microtask. Schedulers without a separate microtask queue
    /// treat it as an ordinary task.
    fn schedule_microtask(&self, microtask: MicroTask) {
        self.schedule_task(microtask.into());
    }
}

/// A scheduler shared between a deferred value and its children.
pub type SharedScheduler = Arc<dyn Scheduler>;
