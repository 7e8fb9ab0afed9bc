//! Unit tests for Deferred

use async_runtime::{Callback, Deferred, EventLoop, Resolution, SharedScheduler, Thenable};
use core_types::{DeferredState, Settlement};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn setup() -> (EventLoop, SharedScheduler) {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    (event_loop, scheduler)
}

fn new_log() -> Log {
    Arc::new(Mutex::new(vec![]))
}

fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

/// A thenable that settles synchronously while being subscribed to.
struct Ready(Result<i32, String>);

impl Thenable<i32, String> for Ready {
    fn subscribe(self: Box<Self>, on_fulfilled: Callback<i32>, on_rejected: Callback<String>) {
        match self.0 {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        }
    }
}

/// A thenable that calls both callbacks.
struct Fickle;

impl Thenable<i32, String> for Fickle {
    fn subscribe(self: Box<Self>, on_fulfilled: Callback<i32>, on_rejected: Callback<String>) {
        on_fulfilled(1);
        on_rejected("too late".to_string());
    }
}

/// A thenable whose subscription panics.
struct Broken;

impl Thenable<i32, String> for Broken {
    fn subscribe(self: Box<Self>, _: Callback<i32>, _: Callback<String>) {
        panic!("subscription exploded");
    }
}

mod settlement {
    use super::*;

    #[test]
    fn resolve_is_visible_immediately() {
        let (_event_loop, scheduler) = setup();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);
        deferred.resolve(3);
        assert_eq!(deferred.state(), DeferredState::Fulfilled);
        assert_eq!(deferred.value(), Some(3));
    }

    #[test]
    fn first_resolve_wins() {
        let (_event_loop, scheduler) = setup();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);
        deferred.resolve(1);
        deferred.resolve(2);
        deferred.reject("late".to_string());
        assert_eq!(deferred.settlement(), Some(Settlement::Fulfilled(1)));
    }

    #[test]
    fn first_reject_wins() {
        let (_event_loop, scheduler) = setup();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);
        deferred.reject("first".to_string());
        deferred.resolve(2);
        deferred.reject("second".to_string());
        assert_eq!(
            deferred.settlement(),
            Some(Settlement::Rejected("first".to_string()))
        );
    }

    #[test]
    fn settling_after_continuations_ran_changes_nothing() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);

        let l = log.clone();
        let child = deferred.then(move |x| {
            l.lock().unwrap().push("handler");
            Ok(x)
        });

        deferred.resolve(1);
        event_loop.run_until_done().unwrap();
        deferred.resolve(2);
        event_loop.run_until_done().unwrap();

        assert_eq!(child.value(), Some(1));
        assert_eq!(entries(&log), vec!["handler"]);
    }

    #[test]
    fn concurrent_settlement_has_one_winner() {
        let (mut event_loop, scheduler) = setup();
        let deferred: Deferred<usize, String> = Deferred::new(&scheduler);
        let runs = Arc::new(Mutex::new(0));

        let r = runs.clone();
        let child = deferred.then(move |x| {
            *r.lock().unwrap() += 1;
            Ok(x)
        });

        let threads: Vec<_> = (0..8)
            .map(|n| {
                let d = deferred.clone();
                std::thread::spawn(move || {
                    if n % 2 == 0 {
                        d.resolve(n);
                    } else {
                        d.reject(format!("thread {n}"));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        event_loop.run_until_done().unwrap();
        assert!(!deferred.is_pending());
        assert_eq!(child.settlement(), deferred.settlement());
        assert_eq!(*runs.lock().unwrap(), usize::from(deferred.value().is_some()));
    }
}

mod ordering {
    use super::*;

    #[test]
    fn continuations_run_in_registration_order_once() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);

        for name in ["A", "B", "C"] {
            let l = log.clone();
            deferred.then(move |x| {
                l.lock().unwrap().push(name);
                Ok(x)
            });
        }

        deferred.resolve(0);
        event_loop.run_until_done().unwrap();
        event_loop.run_until_done().unwrap();

        assert_eq!(entries(&log), vec!["A", "B", "C"]);
    }

    #[test]
    fn resolve_does_not_run_continuations_inline() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);

        let l = log.clone();
        deferred.then(move |x| {
            l.lock().unwrap().push("ran");
            Ok(x)
        });
        deferred.resolve(1);
        assert!(entries(&log).is_empty());

        event_loop.run_all_microtasks().unwrap();
        assert_eq!(entries(&log), vec!["ran"]);
    }

    #[test]
    fn late_registrations_each_run_once() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::resolved(&scheduler, 1);
        event_loop.run_until_done().unwrap();

        let l = log.clone();
        deferred.then(move |x| {
            l.lock().unwrap().push("first");
            Ok(x)
        });
        event_loop.run_until_done().unwrap();

        let l = log.clone();
        deferred.then(move |x| {
            l.lock().unwrap().push("second");
            Ok(x)
        });
        event_loop.run_until_done().unwrap();

        assert_eq!(entries(&log), vec!["first", "second"]);
    }

    #[test]
    fn late_registrations_before_drain_keep_order() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::resolved(&scheduler, 1);

        for name in ["X", "Y", "Z"] {
            let l = log.clone();
            deferred.then(move |x| {
                l.lock().unwrap().push(name);
                Ok(x)
            });
        }
        event_loop.run_until_done().unwrap();

        assert_eq!(entries(&log), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn registration_from_inside_a_handler_runs_later() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::resolved(&scheduler, 1);

        let l = log.clone();
        let again = deferred.clone();
        deferred.then(move |x| {
            l.lock().unwrap().push("outer");
            let l = l.clone();
            again.then(move |y| {
                l.lock().unwrap().push("inner");
                Ok(y)
            });
            Ok(x)
        });
        event_loop.run_until_done().unwrap();

        assert_eq!(entries(&log), vec!["outer", "inner"]);
    }

    static FAIL_NEXT_CLONE: AtomicBool = AtomicBool::new(false);

    /// A value whose next clone panics once armed.
    #[derive(Debug)]
    struct Fragile;

    impl Clone for Fragile {
        fn clone(&self) -> Self {
            if FAIL_NEXT_CLONE.swap(false, AtomicOrdering::SeqCst) {
                panic!("clone failed");
            }
            Fragile
        }
    }

    #[test]
    fn panicking_clone_does_not_stop_the_drain() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<Fragile, String> = Deferred::new(&scheduler);

        let l = log.clone();
        deferred.then(move |x| {
            l.lock().unwrap().push("A");
            FAIL_NEXT_CLONE.store(true, AtomicOrdering::SeqCst);
            Ok(x)
        });
        let l = log.clone();
        let skipped = deferred.then(move |x| {
            l.lock().unwrap().push("B");
            Ok(x)
        });
        let l = log.clone();
        let last = deferred.then(move |x| {
            l.lock().unwrap().push("C");
            Ok(x)
        });
        let l = log.clone();
        deferred.finally(move || l.lock().unwrap().push("cleanup"));

        deferred.resolve(Fragile);
        event_loop.run_until_done().unwrap();

        assert_eq!(entries(&log), vec!["A", "C", "cleanup"]);
        assert!(skipped.is_pending());
        assert!(!last.is_pending());
    }
}

mod flattening {
    use super::*;

    #[test]
    fn returned_deferred_is_flattened() {
        let (mut event_loop, scheduler) = setup();
        let s = scheduler.clone();
        let child = Deferred::<i32, String>::resolved(&scheduler, 3)
            .then(move |v| Deferred::<i32, String>::resolved(&s, v * 2));

        let outcome = event_loop.run_until_settled(&child).unwrap();
        assert_eq!(outcome, Settlement::Fulfilled(6));
    }

    #[test]
    fn nested_three_levels_deep() {
        let (mut event_loop, scheduler) = setup();
        let s = scheduler.clone();
        let child = Deferred::<i32, String>::resolved(&scheduler, 3).then(move |v| {
            let innermost = Deferred::<i32, String>::resolved(&s, v * 2);
            let middle = Deferred::<i32, String>::resolved_with(&s, innermost);
            Deferred::<i32, String>::resolved_with(&s, middle)
        });

        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some(6));
    }

    #[test]
    fn chain_of_deferred_returning_handlers() {
        let (mut event_loop, scheduler) = setup();
        let (s1, s2, s3) = (scheduler.clone(), scheduler.clone(), scheduler.clone());
        let child = Deferred::<i32, String>::resolved(&scheduler, 1)
            .then(move |v| Deferred::<i32, String>::resolved(&s1, v + 1))
            .then(move |v| Deferred::<i32, String>::resolved(&s2, v * 10))
            .then(move |v| Deferred::<i32, String>::resolved(&s3, v - 5));

        assert_eq!(
            event_loop.run_until_settled(&child).unwrap(),
            Settlement::Fulfilled(15)
        );
    }

    #[test]
    fn child_waits_for_pending_returned_deferred() {
        let (mut event_loop, scheduler) = setup();
        let inner: Deferred<i32, String> = Deferred::new(&scheduler);
        let returned = inner.clone();
        let child = Deferred::<i32, String>::resolved(&scheduler, 0).then(move |_| returned);

        event_loop.run_until_done().unwrap();
        assert!(child.is_pending());

        inner.resolve(99);
        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some(99));
    }

    #[test]
    fn returned_rejected_deferred_rejects_child() {
        let (mut event_loop, scheduler) = setup();
        let s = scheduler.clone();
        let child = Deferred::<i32, String>::resolved(&scheduler, 0)
            .then(move |_| Deferred::<i32, String>::rejected(&s, "inner".to_string()));

        event_loop.run_until_done().unwrap();
        assert_eq!(child.reason(), Some("inner".to_string()));
    }

    #[test]
    fn foreign_thenable_is_adopted() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::resolved(&scheduler, 0)
            .then(|_| Resolution::<i32, String>::adopt(Ready(Ok(7))));

        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some(7));
    }

    #[test]
    fn foreign_thenable_rejection_is_adopted() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::resolved(&scheduler, 0)
            .then(|_| Resolution::<i32, String>::adopt(Ready(Err("nope".to_string()))));

        event_loop.run_until_done().unwrap();
        assert_eq!(child.reason(), Some("nope".to_string()));
    }

    #[test]
    fn thenable_calling_both_callbacks_settles_once() {
        let (_event_loop, scheduler) = setup();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);
        deferred.resolve_with(Resolution::adopt(Fickle));
        assert_eq!(deferred.settlement(), Some(Settlement::Fulfilled(1)));
    }

    #[test]
    fn panicking_subscription_rejects() {
        let (_event_loop, scheduler) = setup();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);
        deferred.resolve_with(Resolution::adopt(Broken));
        let reason = deferred.reason().unwrap();
        assert!(reason.contains("subscription exploded"));
    }

    #[test]
    fn adopting_ignores_other_settlement() {
        let (mut event_loop, scheduler) = setup();
        let source: Deferred<i32, String> = Deferred::new(&scheduler);
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);

        deferred.resolve_with(source.clone());
        deferred.resolve(1);
        deferred.reject("ignored".to_string());
        assert!(deferred.is_pending());

        source.resolve(2);
        event_loop.run_until_done().unwrap();
        assert_eq!(deferred.value(), Some(2));
    }

    #[test]
    fn resolved_with_static_constructor_flattens() {
        let (mut event_loop, scheduler) = setup();
        let source = Deferred::<i32, String>::resolved(&scheduler, 5);
        let deferred = Deferred::resolved_with(&scheduler, source);
        assert!(deferred.is_pending());

        event_loop.run_until_done().unwrap();
        assert_eq!(deferred.value(), Some(5));
    }

    #[test]
    fn resolved_with_plain_result() {
        let (_event_loop, scheduler) = setup();
        let ok = Deferred::<i32, String>::resolved_with(&scheduler, Ok(1));
        let err = Deferred::<i32, String>::resolved_with(&scheduler, Err("e".to_string()));
        assert_eq!(ok.value(), Some(1));
        assert_eq!(err.reason(), Some("e".to_string()));
    }
}

mod pass_through {
    use super::*;

    #[test]
    fn forward_passes_value() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::resolved(&scheduler, 8).forward();
        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some(8));
    }

    #[test]
    fn forward_passes_reason() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::rejected(&scheduler, "r".to_string()).forward();
        event_loop.run_until_done().unwrap();
        assert_eq!(child.reason(), Some("r".to_string()));
    }

    #[test]
    fn then_skips_handler_on_rejection() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let l = log.clone();
        let child = Deferred::<i32, String>::rejected(&scheduler, "r".to_string()).then(move |x| {
            l.lock().unwrap().push("called");
            Ok(x)
        });

        event_loop.run_until_done().unwrap();
        assert!(entries(&log).is_empty());
        assert_eq!(child.reason(), Some("r".to_string()));
    }

    #[test]
    fn catch_skips_handler_on_fulfillment() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let l = log.clone();
        let child = Deferred::<i32, String>::resolved(&scheduler, 2).catch(move |_| {
            l.lock().unwrap().push("called");
            Ok(0)
        });

        event_loop.run_until_done().unwrap();
        assert!(entries(&log).is_empty());
        assert_eq!(child.value(), Some(2));
    }

    #[test]
    fn rejection_travels_until_caught() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::rejected(&scheduler, "deep".to_string())
            .then(|x| Ok(x + 1))
            .then(|x| Ok(x * 2))
            .catch(|reason| Ok(reason.len() as i32))
            .then(|x| Ok(x + 100));

        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some(104));
    }

    #[test]
    fn then_with_uses_rejection_handler() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::rejected(&scheduler, "abc".to_string())
            .then_with(|x| Ok(x.to_string()), |reason| Ok(format!("recovered {reason}")));

        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some("recovered abc".to_string()));
    }

    #[test]
    fn then_with_uses_fulfillment_handler() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::resolved(&scheduler, 12)
            .then_with(|x| Ok(x.to_string()), |reason| Ok(reason));

        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some("12".to_string()));
    }

    #[test]
    fn catch_handler_can_rethrow() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::rejected(&scheduler, "a".to_string())
            .catch(|reason| Err(format!("{reason}b")));

        event_loop.run_until_done().unwrap();
        assert_eq!(child.reason(), Some("ab".to_string()));
    }
}

mod finally {
    use super::*;

    #[test]
    fn preserves_rejection() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);

        let l = log.clone();
        let child = deferred.finally(move || l.lock().unwrap().push("cleanup"));
        deferred.reject("R".to_string());
        assert!(entries(&log).is_empty());

        event_loop.run_until_done().unwrap();
        assert_eq!(entries(&log), vec!["cleanup"]);
        assert_eq!(child.reason(), Some("R".to_string()));
    }

    #[test]
    fn preserves_value() {
        let (mut event_loop, scheduler) = setup();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);
        let child = deferred.finally(|| {});
        deferred.resolve(5);

        event_loop.run_until_done().unwrap();
        assert_eq!(child.value(), Some(5));
    }

    #[test]
    fn runs_synchronously_on_settled_parent() {
        let (_event_loop, scheduler) = setup();
        let log = new_log();
        let deferred = Deferred::<i32, String>::rejected(&scheduler, "R".to_string());

        let l = log.clone();
        let child = deferred.finally(move || l.lock().unwrap().push("cleanup"));

        assert_eq!(entries(&log), vec!["cleanup"]);
        assert_eq!(child.reason(), Some("R".to_string()));
    }

    #[test]
    fn runs_once() {
        let (mut event_loop, scheduler) = setup();
        let count = Arc::new(Mutex::new(0));
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);

        let c = count.clone();
        deferred.finally(move || *c.lock().unwrap() += 1);
        deferred.resolve(1);
        event_loop.run_until_done().unwrap();
        deferred.resolve(2);
        event_loop.run_until_done().unwrap();

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn runs_after_then_entries() {
        let (mut event_loop, scheduler) = setup();
        let log = new_log();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);

        let l = log.clone();
        deferred.finally(move || l.lock().unwrap().push("finally"));
        let l = log.clone();
        deferred.then(move |x| {
            l.lock().unwrap().push("then");
            Ok(x)
        });
        deferred.resolve(1);
        event_loop.run_until_done().unwrap();

        assert_eq!(entries(&log), vec!["then", "finally"]);
    }

    #[test]
    fn failing_cleanup_overrides_outcome() {
        let (mut event_loop, scheduler) = setup();
        let deferred: Deferred<i32, String> = Deferred::new(&scheduler);
        let child = deferred.try_finally(|| Err("cleanup failed".to_string()));
        deferred.resolve(1);

        event_loop.run_until_done().unwrap();
        assert_eq!(child.reason(), Some("cleanup failed".to_string()));
    }

    #[test]
    fn panicking_cleanup_overrides_outcome() {
        let (_event_loop, scheduler) = setup();
        let deferred = Deferred::<i32, String>::resolved(&scheduler, 1);
        let child = deferred.finally(|| panic!("cleanup panicked"));

        let reason = child.reason().unwrap();
        assert!(reason.contains("cleanup panicked"));
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn resolved_then_increments() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::resolved(&scheduler, 5).then(|x| Ok(x + 1));
        assert_eq!(
            event_loop.run_until_settled(&child).unwrap(),
            Settlement::Fulfilled(6)
        );
    }

    #[test]
    fn rejected_catch_measures_reason() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<usize, String>::rejected(&scheduler, "boom".to_string())
            .catch(|reason| Ok(reason.len()));
        assert_eq!(
            event_loop.run_until_settled(&child).unwrap(),
            Settlement::Fulfilled(4)
        );
    }

    #[test]
    fn failing_handler_rejects_child() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::resolved(&scheduler, 1)
            .then(|_| Err::<i32, String>("handler failed".to_string()));
        assert_eq!(
            event_loop.run_until_settled(&child).unwrap(),
            Settlement::Rejected("handler failed".to_string())
        );
    }

    #[test]
    fn panicking_handler_rejects_child() {
        let (mut event_loop, scheduler) = setup();
        let child = Deferred::<i32, String>::resolved(&scheduler, 1)
            .then(|x| -> Result<i32, String> {
                if x > 0 {
                    panic!("handler panicked");
                }
                Ok(x)
            });
        let reason = event_loop.run_until_settled(&child).unwrap().into_result().unwrap_err();
        assert!(reason.contains("handler panicked"));
    }

    #[test]
    fn executor_settles_after_constructor_returns() {
        let (mut event_loop, scheduler) = setup();
        let deferred = Deferred::<i32, String>::with_executor(&scheduler, |settle| {
            settle.resolve(1);
            Ok(())
        });
        assert!(deferred.is_pending());

        event_loop.run_until_done().unwrap();
        assert_eq!(deferred.value(), Some(1));
    }
}

mod executor {
    use super::*;

    #[test]
    fn error_rejects() {
        let (mut event_loop, scheduler) = setup();
        let deferred =
            Deferred::<i32, String>::with_executor(&scheduler, |_| Err("executor failed".to_string()));
        event_loop.run_until_done().unwrap();
        assert_eq!(deferred.reason(), Some("executor failed".to_string()));
    }

    #[test]
    fn panic_rejects() {
        let (mut event_loop, scheduler) = setup();
        let deferred = Deferred::<i32, String>::with_executor(&scheduler, |_| panic!("no executor"));
        event_loop.run_until_done().unwrap();
        assert!(deferred.reason().unwrap().contains("no executor"));
    }

    #[test]
    fn error_after_resolve_is_ignored() {
        let (mut event_loop, scheduler) = setup();
        let deferred = Deferred::<i32, String>::with_executor(&scheduler, |settle| {
            settle.resolve(1);
            Err("after the fact".to_string())
        });
        event_loop.run_until_done().unwrap();
        assert_eq!(deferred.value(), Some(1));
    }

    #[test]
    fn settle_handle_can_escape_executor() {
        let (mut event_loop, scheduler) = setup();
        let stash = Arc::new(Mutex::new(None));

        let s = stash.clone();
        let deferred = Deferred::<i32, String>::with_executor(&scheduler, move |settle| {
            *s.lock().unwrap() = Some(settle);
            Ok(())
        });
        event_loop.run_until_done().unwrap();
        assert!(deferred.is_pending());

        let settle = stash.lock().unwrap().take().unwrap();
        settle.reject("later".to_string());
        assert_eq!(deferred.reason(), Some("later".to_string()));
    }

    #[test]
    fn executor_can_resolve_with_deferred() {
        let (mut event_loop, scheduler) = setup();
        let source = Deferred::<i32, String>::resolved(&scheduler, 11);
        let deferred = Deferred::<i32, String>::with_executor(&scheduler, move |settle| {
            settle.resolve_with(source);
            Ok(())
        });
        assert_eq!(
            event_loop.run_until_settled(&deferred).unwrap(),
            Settlement::Fulfilled(11)
        );
    }
}
