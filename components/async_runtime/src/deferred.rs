//! Deferred values.
//!
//! A [`Deferred`] is a shared cell that starts out pending and settles exactly
//! once. Continuations registered with [`then`](Deferred::then),
//! [`catch`](Deferred::catch) and [`finally`](Deferred::finally) are queued on
//! the cell and drained, in registration order, by a microtask scheduled after
//! settlement. A continuation that returns another deferred value does not
//! settle its child directly; the child adopts the returned value instead.

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use core_types::{Boundary, DeferredState, Panicked, Settlement};
use parking_lot::Mutex;

use crate::scheduler::SharedScheduler;
use crate::task_queue::{MicroTask, Task};
use crate::thenable::{Callback, IntoResolution, Resolution, Thenable};

type Handler<A, U, E> = Box<dyn FnOnce(A) -> Resolution<U, E> + Send>;
type Cleanup<E> = Box<dyn FnOnce() -> Result<(), E> + Send>;

/// Runs caller code, converting a panic into a [`Panicked`] failure.
pub(crate) fn guarded<R>(boundary: Boundary, f: impl FnOnce() -> R) -> Result<R, Panicked> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let failure = Panicked::from_payload(boundary, payload);
        tracing::warn!(%failure, "converted panic into rejection");
        failure
    })
}

fn invoke<U, E>(f: impl FnOnce() -> Resolution<U, E>) -> Resolution<U, E>
where
    E: From<Panicked>,
{
    guarded(Boundary::Continuation, f).unwrap_or_else(|failure| Resolution::Rejected(failure.into()))
}

fn run_cleanup<T, E>(on_settled: Cleanup<E>, outcome: Settlement<T, E>) -> Settlement<T, E>
where
    E: From<Panicked>,
{
    match guarded(Boundary::Cleanup, on_settled) {
        Ok(Ok(())) => outcome,
        Ok(Err(reason)) => Settlement::Rejected(reason),
        Err(failure) => Settlement::Rejected(failure.into()),
    }
}

/// A queued reaction to the parent's settlement.
trait Continuation<T, E>: Send {
    fn settle(self: Box<Self>, outcome: Settlement<T, E>);
}

/// An entry created by `then`, `catch` or `forward`.
///
/// A missing fulfillment handler is only expressible when the child has the
/// parent's value type, so it is stored as the identity handler. A missing
/// rejection handler passes the reason through to the child.
struct ThenEntry<T, U, E> {
    child: Deferred<U, E>,
    on_fulfilled: Handler<T, U, E>,
    on_rejected: Option<Handler<E, U, E>>,
}

impl<T, U, E> Continuation<T, E> for ThenEntry<T, U, E>
where
    T: Send + 'static,
    U: Clone + Send + 'static,
    E: Clone + Send + From<Panicked> + 'static,
{
    fn settle(self: Box<Self>, outcome: Settlement<T, E>) {
        let ThenEntry {
            child,
            on_fulfilled,
            on_rejected,
        } = *self;
        let resolution = match outcome {
            Settlement::Fulfilled(value) => invoke(move || on_fulfilled(value)),
            Settlement::Rejected(reason) => match on_rejected {
                Some(handler) => invoke(move || handler(reason)),
                None => Resolution::Rejected(reason),
            },
        };
        child.resolve_with(resolution);
    }
}

/// An entry created when something subscribes to this cell as a thenable.
struct Subscription<T, E> {
    on_fulfilled: Callback<T>,
    on_rejected: Callback<E>,
}

impl<T: Send, E: Send> Continuation<T, E> for Subscription<T, E> {
    fn settle(self: Box<Self>, outcome: Settlement<T, E>) {
        match outcome {
            Settlement::Fulfilled(value) => (self.on_fulfilled)(value),
            Settlement::Rejected(reason) => (self.on_rejected)(reason),
        }
    }
}

struct CleanupEntry<T, E> {
    child: Deferred<T, E>,
    on_settled: Cleanup<E>,
}

struct Inner<T, E> {
    outcome: Option<Settlement<T, E>>,
    adopting: bool,
    drain_scheduled: bool,
    continuations: Vec<Box<dyn Continuation<T, E>>>,
    cleanups: Vec<CleanupEntry<T, E>>,
    scheduler: SharedScheduler,
}

impl<T, E> Inner<T, E> {
    /// Marks a drain as scheduled if the cell is settled and has queued work.
    fn request_drain(&mut self) -> Option<SharedScheduler> {
        let has_work = !self.continuations.is_empty() || !self.cleanups.is_empty();
        if self.outcome.is_none() || self.drain_scheduled || !has_work {
            return None;
        }
        self.drain_scheduled = true;
        Some(Arc::clone(&self.scheduler))
    }
}

/// A value or failure that becomes available later.
///
/// `Deferred` is a handle; clones share the same cell. The cell is guarded by
/// a mutex so settlement and draining stay exactly-once even when several
/// threads race, but caller code never runs while the lock is held.
///
/// # Examples
///
/// ```
/// use async_runtime::{Deferred, EventLoop};
/// use core_types::Settlement;
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let doubled = Deferred::<i32, String>::resolved(&scheduler, 5)
///     .then(|x| Ok(x + 1))
///     .then(|x| Ok(x * 2));
///
/// let outcome = event_loop.run_until_settled(&doubled).unwrap();
/// assert_eq!(outcome, Settlement::Fulfilled(12));
/// ```
pub struct Deferred<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T, E> Deferred<T, E> {
    /// The current lifecycle state.
    pub fn state(&self) -> DeferredState {
        self.inner
            .lock()
            .outcome
            .as_ref()
            .map_or(DeferredState::Pending, Settlement::state)
    }

    /// Returns `true` until the value settles.
    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// The scheduler this value and its children use.
    pub fn scheduler(&self) -> SharedScheduler {
        Arc::clone(&self.inner.lock().scheduler)
    }
}

impl<T: Clone, E: Clone> Deferred<T, E> {
    /// A copy of the settled outcome, if any.
    pub fn settlement(&self) -> Option<Settlement<T, E>> {
        self.inner.lock().outcome.clone()
    }

    /// The fulfillment value, once fulfilled.
    pub fn value(&self) -> Option<T> {
        self.settlement().and_then(|outcome| outcome.into_result().ok())
    }

    /// The rejection reason, once rejected.
    pub fn reason(&self) -> Option<E> {
        self.settlement().and_then(|outcome| outcome.into_result().err())
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Panicked> + 'static,
{
    fn from_outcome(scheduler: &SharedScheduler, outcome: Option<Settlement<T, E>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                outcome,
                adopting: false,
                drain_scheduled: false,
                continuations: Vec::new(),
                cleanups: Vec::new(),
                scheduler: Arc::clone(scheduler),
            })),
        }
    }

    /// Creates a pending value with no construction callback.
    ///
    /// It settles only through [`resolve`](Self::resolve),
    /// [`reject`](Self::reject) or [`resolve_with`](Self::resolve_with).
    pub fn new(scheduler: &SharedScheduler) -> Self {
        Self::from_outcome(scheduler, None)
    }

    /// Creates a pending value whose executor runs as a later task.
    ///
    /// The executor receives a [`Settle`] handle bound to the new value. It is
    /// never invoked during construction, so settling synchronously inside
    /// the executor still settles after this call has returned. Returning
    /// `Err` or panicking rejects the value, unless it already settled.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_runtime::{Deferred, EventLoop};
    ///
    /// let mut event_loop = EventLoop::new();
    /// let deferred = Deferred::<&str, String>::with_executor(&event_loop.scheduler(), |settle| {
    ///     settle.resolve("ready");
    ///     Ok(())
    /// });
    /// assert!(deferred.is_pending());
    ///
    /// event_loop.run_until_done().unwrap();
    /// assert_eq!(deferred.value(), Some("ready"));
    /// ```
    pub fn with_executor<F>(scheduler: &SharedScheduler, executor: F) -> Self
    where
        F: FnOnce(Settle<T, E>) -> Result<(), E> + Send + 'static,
    {
        let deferred = Self::new(scheduler);
        let target = deferred.clone();
        scheduler.schedule_task(Task::new(move || {
            let settle = Settle {
                target: target.clone(),
            };
            match guarded(Boundary::Executor, move || executor(settle)) {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => target.reject(reason),
                Err(failure) => target.reject(failure.into()),
            }
        }));
        deferred
    }

    /// Creates a value already fulfilled with `value`.
    pub fn resolved(scheduler: &SharedScheduler, value: T) -> Self {
        Self::settled(scheduler, Settlement::Fulfilled(value))
    }

    /// Creates a value already rejected with `reason`.
    pub fn rejected(scheduler: &SharedScheduler, reason: E) -> Self {
        Self::settled(scheduler, Settlement::Rejected(reason))
    }

    /// Creates a value already settled with `outcome`.
    pub fn settled(scheduler: &SharedScheduler, outcome: Settlement<T, E>) -> Self {
        Self::from_outcome(scheduler, Some(outcome))
    }

    /// Creates a value resolved with anything convertible to a
    /// [`Resolution`]; thenables are adopted.
    pub fn resolved_with(scheduler: &SharedScheduler, resolution: impl IntoResolution<T, E>) -> Self {
        let deferred = Self::new(scheduler);
        deferred.resolve_with(resolution);
        deferred
    }

    /// Fulfills the value. No-op once settled or adopting a thenable.
    pub fn resolve(&self, value: T) {
        self.settle(Settlement::Fulfilled(value), false);
    }

    /// Rejects the value. No-op once settled or adopting a thenable.
    pub fn reject(&self, reason: E) {
        self.settle(Settlement::Rejected(reason), false);
    }

    /// Settles from a [`Resolution`], adopting the outcome of a thenable.
    ///
    /// While a thenable is being adopted the value stays pending, and every
    /// other settlement attempt is ignored.
    pub fn resolve_with(&self, resolution: impl IntoResolution<T, E>) {
        match resolution.into_resolution() {
            Resolution::Fulfilled(value) => self.resolve(value),
            Resolution::Rejected(reason) => self.reject(reason),
            Resolution::Thenable(thenable) => self.adopt(thenable),
        }
    }

    fn adopt(&self, thenable: Box<dyn Thenable<T, E>>) {
        {
            let mut inner = self.inner.lock();
            if inner.outcome.is_some() || inner.adopting {
                return;
            }
            inner.adopting = true;
        }
        tracing::debug!("adopting thenable");

        let on_fulfilled = self.clone();
        let on_rejected = self.clone();
        let subscribed = guarded(Boundary::Subscription, move || {
            thenable.subscribe(
                Box::new(move |value| on_fulfilled.settle(Settlement::Fulfilled(value), true)),
                Box::new(move |reason| on_rejected.settle(Settlement::Rejected(reason), true)),
            );
        });
        if let Err(failure) = subscribed {
            self.settle(Settlement::Rejected(failure.into()), true);
        }
    }

    fn settle(&self, outcome: Settlement<T, E>, adopted: bool) {
        let scheduler = {
            let mut inner = self.inner.lock();
            if inner.outcome.is_some() || (inner.adopting && !adopted) {
                return;
            }
            tracing::trace!(state = %outcome.state(), "deferred settled");
            inner.outcome = Some(outcome);
            inner.request_drain()
        };
        if let Some(scheduler) = scheduler {
            self.schedule_drain(&scheduler);
        }
    }

    fn schedule_drain(&self, scheduler: &SharedScheduler) {
        let this = self.clone();
        scheduler.schedule_microtask(MicroTask::new(move || this.drain()));
    }

    /// Runs every queued entry once. Entries queued while draining are left
    /// for the next drain, which their registration schedules.
    fn drain(&self) {
        let (outcome, continuations, cleanups) = {
            let mut inner = self.inner.lock();
            inner.drain_scheduled = false;
            let Some(outcome) = inner.outcome.clone() else {
                return;
            };
            (
                outcome,
                mem::take(&mut inner.continuations),
                mem::take(&mut inner.cleanups),
            )
        };
        tracing::trace!(
            continuations = continuations.len(),
            cleanups = cleanups.len(),
            "draining settled deferred"
        );

        for entry in continuations {
            // Handler panics are already rejections; this catches panicking
            // subscription callbacks and clones so later entries still run.
            let outcome = &outcome;
            let settled = guarded(Boundary::Subscription, move || entry.settle(outcome.clone()));
            if let Err(failure) = settled {
                tracing::trace!(%failure, "dropped continuation entry, draining the rest");
            }
        }
        for CleanupEntry { child, on_settled } in cleanups {
            let settled = match guarded(Boundary::Cleanup, || outcome.clone()) {
                Ok(outcome) => run_cleanup(on_settled, outcome),
                Err(failure) => Settlement::Rejected(failure.into()),
            };
            child.settle(settled, false);
        }
    }

    fn register(&self, entry: Box<dyn Continuation<T, E>>) {
        let scheduler = {
            let mut inner = self.inner.lock();
            inner.continuations.push(entry);
            inner.request_drain()
        };
        if let Some(scheduler) = scheduler {
            self.schedule_drain(&scheduler);
        }
    }

    fn chain<U>(
        &self,
        on_fulfilled: Handler<T, U, E>,
        on_rejected: Option<Handler<E, U, E>>,
    ) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
    {
        let child = Deferred::new(&self.scheduler());
        self.register(Box::new(ThenEntry {
            child: child.clone(),
            on_fulfilled,
            on_rejected,
        }));
        child
    }

    /// Registers a fulfillment handler; rejections pass through unchanged.
    ///
    /// The handler may return `Result<U, E>`, a [`Resolution`], or another
    /// `Deferred<U, E>`, which the returned child adopts. The child is
    /// returned pending even when this value has already settled.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_runtime::{Deferred, EventLoop};
    ///
    /// let mut event_loop = EventLoop::new();
    /// let scheduler = event_loop.scheduler();
    ///
    /// let flattened = Deferred::<i32, String>::resolved(&scheduler, 3)
    ///     .then({
    ///         let scheduler = scheduler.clone();
    ///         move |v| Deferred::<i32, String>::resolved(&scheduler, v * 2)
    ///     });
    ///
    /// event_loop.run_until_done().unwrap();
    /// assert_eq!(flattened.value(), Some(6));
    /// ```
    pub fn then<U, F, R>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoResolution<U, E>,
    {
        self.chain(
            Box::new(move |value| on_fulfilled(value).into_resolution()),
            None,
        )
    }

    /// Registers both a fulfillment and a rejection handler.
    ///
    /// A rejection handler that returns normally turns the chain back into
    /// fulfillment.
    pub fn then_with<U, F, G, R1, R2>(&self, on_fulfilled: F, on_rejected: G) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> R1 + Send + 'static,
        G: FnOnce(E) -> R2 + Send + 'static,
        R1: IntoResolution<U, E>,
        R2: IntoResolution<U, E>,
    {
        self.chain(
            Box::new(move |value| on_fulfilled(value).into_resolution()),
            Some(Box::new(move |reason| on_rejected(reason).into_resolution())),
        )
    }

    /// Registers a rejection handler; values pass through unchanged.
    pub fn catch<G, R>(&self, on_rejected: G) -> Deferred<T, E>
    where
        G: FnOnce(E) -> R + Send + 'static,
        R: IntoResolution<T, E>,
    {
        self.chain::<T>(
            Box::new(Resolution::Fulfilled),
            Some(Box::new(move |reason| on_rejected(reason).into_resolution())),
        )
    }

    /// Registers an entry with no handlers; the child mirrors this value.
    pub fn forward(&self) -> Deferred<T, E> {
        self.chain::<T>(Box::new(Resolution::Fulfilled), None)
    }

    /// Runs `on_settled` once this value settles, whatever the outcome.
    ///
    /// The returned value settles with this value's outcome. If this value
    /// has already settled, `on_settled` runs before `finally` returns and the
    /// returned value is already settled. A panic in `on_settled` rejects the
    /// returned value instead.
    pub fn finally<F>(&self, on_settled: F) -> Deferred<T, E>
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_finally(move || {
            on_settled();
            Ok(())
        })
    }

    /// Like [`finally`](Self::finally), but a failing side effect rejects the
    /// returned value with its error, overriding this value's outcome.
    pub fn try_finally<F>(&self, on_settled: F) -> Deferred<T, E>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        let outcome = inner.outcome.clone();
        match outcome {
            Some(outcome) => {
                let scheduler = Arc::clone(&inner.scheduler);
                drop(inner);
                Deferred::settled(&scheduler, run_cleanup(Box::new(on_settled), outcome))
            }
            None => {
                let child = Deferred::new(&inner.scheduler);
                inner.cleanups.push(CleanupEntry {
                    child: child.clone(),
                    on_settled: Box::new(on_settled),
                });
                child
            }
        }
    }
}

impl<T, E> Thenable<T, E> for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Panicked> + 'static,
{
    fn subscribe(self: Box<Self>, on_fulfilled: Callback<T>, on_rejected: Callback<E>) {
        self.register(Box::new(Subscription {
            on_fulfilled,
            on_rejected,
        }));
    }
}

impl<T, E> IntoResolution<T, E> for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Panicked> + 'static,
{
    fn into_resolution(self) -> Resolution<T, E> {
        Resolution::Thenable(Box::new(self))
    }
}

/// The settlement entry points handed to an executor.
///
/// Clones settle the same value; only the first settlement has any effect.
pub struct Settle<T, E> {
    target: Deferred<T, E>,
}

impl<T, E> Clone for Settle<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Settle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Settle").field(&self.target).finish()
    }
}

impl<T, E> Settle<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Panicked> + 'static,
{
    /// Fulfills the bound value.
    pub fn resolve(&self, value: T) {
        self.target.resolve(value);
    }

    /// Rejects the bound value.
    pub fn reject(&self, reason: E) {
        self.target.reject(reason);
    }

    /// Settles the bound value from a resolution, adopting thenables.
    pub fn resolve_with(&self, resolution: impl IntoResolution<T, E>) {
        self.target.resolve_with(resolution);
    }
}
