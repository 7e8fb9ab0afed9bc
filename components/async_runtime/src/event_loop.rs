//! Event loop implementation.
//!
//! This module provides the event loop that drives deferred values: it owns
//! the task, microtask and timer queues, hands out [`LoopHandle`]s that act as
//! the [`Scheduler`] for deferred values, and runs background jobs whose
//! results are delivered back onto the loop thread.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use core_types::{Boundary, Panicked, Settlement};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::LoopConfig;
use crate::deferred::{guarded, Deferred};
use crate::error::LoopError;
use crate::scheduler::{Scheduler, SharedScheduler};
use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue, TimerQueue};

/// The longest delay a timer is actually scheduled with.
pub const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

#[derive(Default)]
struct Queues {
    tasks: TaskQueue,
    microtasks: MicrotaskQueue,
    timers: TimerQueue,
}

struct Shared {
    queues: Mutex<Queues>,
    in_flight: AtomicUsize,
    wake: Sender<()>,
}

impl Shared {
    fn notify(&self) {
        // A full channel already holds a pending wakeup.
        let _ = self.wake.try_send(());
    }
}

/// The event loop.
///
/// Each turn of the loop:
/// 1. Drains all microtasks
/// 2. Takes the oldest ready task (or the earliest due timer) and runs it
/// 3. If nothing is ready, sleeps until the next timer or background job
///
/// The loop is also the synchronous scheduler used by tests: nothing runs
/// until one of the `run_*` methods is called.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Task};
///
/// let mut event_loop = EventLoop::new();
///
/// event_loop.enqueue_task(Task::new(|| println!("hello")));
/// event_loop.run_until_done().unwrap();
/// ```
pub struct EventLoop {
    shared: Arc<Shared>,
    wakeups: Receiver<()>,
    config: LoopConfig,
    steps: usize,
}

impl EventLoop {
    /// Creates a new EventLoop with empty queues and no limits.
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Creates a new EventLoop with the given limits.
    pub fn with_config(config: LoopConfig) -> Self {
        let (wake, wakeups) = channel::bounded(1);
        Self {
            shared: Arc::new(Shared {
                queues: Mutex::new(Queues::default()),
                in_flight: AtomicUsize::new(0),
                wake,
            }),
            wakeups,
            config,
            steps: 0,
        }
    }

    /// The limits this loop runs under.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// A handle for scheduling work onto this loop from anywhere.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// This loop as a scheduler for deferred values.
    pub fn scheduler(&self) -> SharedScheduler {
        self.handle().scheduler()
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&self, task: Task) {
        self.handle().schedule_task(task);
    }

    /// Adds a microtask to the microtask queue.
    pub fn enqueue_microtask(&self, microtask: MicroTask) {
        self.handle().schedule_microtask(microtask);
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.shared.queues.lock().tasks.is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.shared.queues.lock().microtasks.is_empty()
    }

    /// Returns the number of timers that have not fired yet.
    pub fn pending_timers(&self) -> usize {
        self.shared.queues.lock().timers.len()
    }

    /// Returns the number of background jobs still running.
    pub fn jobs_in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Runs all microtasks in the queue until empty.
    ///
    /// New microtasks added during execution are processed before this
    /// method returns.
    pub fn run_all_microtasks(&mut self) -> Result<(), LoopError> {
        self.steps = 0;
        self.drain_microtasks()
    }

    fn drain_microtasks(&mut self) -> Result<(), LoopError> {
        while let Some(microtask) = self.next_microtask() {
            self.count_step()?;
            microtask.run();
        }
        Ok(())
    }

    /// Runs all ready tasks (without processing microtasks between them).
    ///
    /// This is primarily for testing purposes.
    pub fn run_all_tasks(&mut self) -> Result<(), LoopError> {
        self.steps = 0;
        while let Some(task) = self.next_task(Instant::now()) {
            self.count_step()?;
            task.run();
        }
        Ok(())
    }

    /// Processes one complete cycle: one task followed by all microtasks.
    pub fn process_one_cycle(&mut self) -> Result<(), LoopError> {
        self.steps = 0;
        if let Some(task) = self.next_task(Instant::now()) {
            self.count_step()?;
            task.run();
        }
        self.drain_microtasks()
    }

    /// Runs until no tasks, microtasks, timers or background jobs remain.
    pub fn run_until_done(&mut self) -> Result<(), LoopError> {
        self.steps = 0;
        self.run_while(|| true)
    }

    /// Runs until `deferred` settles and returns its outcome.
    ///
    /// Returns [`LoopError::Stalled`] if the loop runs out of work while the
    /// value is still pending.
    pub fn run_until_settled<T, E>(
        &mut self,
        deferred: &Deferred<T, E>,
    ) -> Result<Settlement<T, E>, LoopError>
    where
        T: Clone,
        E: Clone,
    {
        self.steps = 0;
        self.run_while(|| deferred.is_pending())?;
        deferred.settlement().ok_or(LoopError::Stalled)
    }

    fn run_while(&mut self, mut keep_going: impl FnMut() -> bool) -> Result<(), LoopError> {
        loop {
            self.drain_microtasks()?;
            if !keep_going() {
                return Ok(());
            }
            if let Some(task) = self.next_task(Instant::now()) {
                self.count_step()?;
                task.run();
                continue;
            }
            if !self.wait_for_work()? {
                return Ok(());
            }
        }
    }

    fn next_microtask(&self) -> Option<MicroTask> {
        self.shared.queues.lock().microtasks.dequeue()
    }

    fn next_task(&self, now: Instant) -> Option<Task> {
        let mut queues = self.shared.queues.lock();
        match queues.tasks.dequeue() {
            Some(task) => Some(task),
            None => queues.timers.pop_due(now),
        }
    }

    /// Blocks until more work may be available. Returns `false` when nothing
    /// can ever arrive.
    fn wait_for_work(&self) -> Result<bool, LoopError> {
        // Jobs enqueue their completion before leaving the in-flight count,
        // so reading the count first cannot miss a completion.
        let in_flight = self.shared.in_flight.load(Ordering::Acquire);
        let deadline = {
            let queues = self.shared.queues.lock();
            if !queues.tasks.is_empty() || !queues.microtasks.is_empty() {
                return Ok(true);
            }
            queues.timers.next_deadline()
        };

        if let Some(deadline) = deadline {
            let timeout = deadline.saturating_duration_since(Instant::now());
            tracing::trace!(?timeout, "sleeping until next timer");
            let _ = self.wakeups.recv_timeout(timeout);
            return Ok(true);
        }
        if in_flight == 0 {
            return Ok(false);
        }

        tracing::debug!(in_flight, "waiting for background jobs");
        match self.config.idle_timeout {
            Some(limit) => match self.wakeups.recv_timeout(limit) {
                Err(RecvTimeoutError::Timeout) => Err(LoopError::IdleTimeout(limit)),
                _ => Ok(true),
            },
            None => {
                let _ = self.wakeups.recv();
                Ok(true)
            }
        }
    }

    fn count_step(&mut self) -> Result<(), LoopError> {
        self.steps += 1;
        match self.config.max_steps {
            Some(limit) if self.steps > limit => Err(LoopError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.shared.queues.lock();
        f.debug_struct("EventLoop")
            .field("tasks", &queues.tasks.len())
            .field("microtasks", &queues.microtasks.len())
            .field("timers", &queues.timers)
            .field("jobs_in_flight", &self.jobs_in_flight())
            .field("config", &self.config)
            .finish()
    }
}

/// A clonable, thread-safe handle onto an [`EventLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoopHandle { .. }")
    }
}

impl Scheduler for LoopHandle {
    fn schedule_task(&self, task: Task) {
        self.shared.queues.lock().tasks.enqueue(task);
        self.shared.notify();
    }

    fn schedule_microtask(&self, microtask: MicroTask) {
        self.shared.queues.lock().microtasks.enqueue(microtask);
        self.shared.notify();
    }
}

impl LoopHandle {
    /// This handle as a scheduler for deferred values.
    pub fn scheduler(&self) -> SharedScheduler {
        Arc::new(self.clone())
    }

    /// Runs `task` once `delay` has elapsed.
    ///
    /// A delay too large to represent as a deadline is clamped to
    /// [`FAR_FUTURE`], so the timer stays pending instead of overflowing.
    pub fn set_timeout(&self, delay: Duration, task: Task) {
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.shared.queues.lock().timers.insert(deadline, task);
        self.shared.notify();
    }

    /// A value that fulfills with `value` after `duration`.
    pub fn delay<T, E>(&self, duration: Duration, value: T) -> Deferred<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + From<Panicked> + 'static,
    {
        let deferred = Deferred::new(&self.scheduler());
        let target = deferred.clone();
        self.set_timeout(duration, Task::new(move || target.resolve(value)));
        deferred
    }

    /// Runs `job` on a worker thread and settles the returned value with its
    /// result on the loop thread. A panicking job rejects the value.
    pub fn spawn_blocking<T, E, F>(&self, job: F) -> Deferred<T, E>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + From<Panicked> + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let deferred = Deferred::new(&self.scheduler());
        let target = deferred.clone();
        let handle = self.clone();

        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name("deferred-job".to_string())
            .spawn(move || {
                let outcome = match guarded(Boundary::Job, job) {
                    Ok(result) => Settlement::from(result),
                    Err(failure) => Settlement::Rejected(failure.into()),
                };
                handle.schedule_task(Task::new(move || target.resolve_with(outcome.into_result())));
                handle.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
                handle.shared.notify();
            });

        if let Err(err) = spawned {
            self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
            tracing::error!(%err, "failed to spawn background job");
            deferred.reject(Panicked::new(Boundary::Job, format!("failed to spawn worker: {err}")).into());
        }
        deferred
    }
}
