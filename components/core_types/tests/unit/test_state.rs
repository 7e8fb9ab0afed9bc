//! Unit tests for DeferredState and Settlement

use core_types::{DeferredState, Settlement};

#[cfg(test)]
mod deferred_state_tests {
    use super::*;

    #[test]
    fn test_pending_is_not_settled() {
        assert!(DeferredState::Pending.is_pending());
        assert!(!DeferredState::Pending.is_settled());
    }

    #[test]
    fn test_terminal_states_are_settled() {
        assert!(DeferredState::Fulfilled.is_settled());
        assert!(DeferredState::Rejected.is_settled());
        assert!(!DeferredState::Rejected.is_pending());
    }

    #[test]
    fn test_state_is_copy() {
        let state = DeferredState::Fulfilled;
        let copy = state;
        assert_eq!(state, copy);
    }
}

#[cfg(test)]
mod settlement_tests {
    use super::*;

    #[test]
    fn test_fulfilled_exposes_only_value() {
        let outcome: Settlement<i32, String> = Settlement::Fulfilled(5);
        assert!(outcome.is_fulfilled());
        assert_eq!(outcome.value(), Some(&5));
        assert_eq!(outcome.reason(), None);
    }

    #[test]
    fn test_rejected_exposes_only_reason() {
        let outcome: Settlement<i32, String> = Settlement::Rejected("boom".to_string());
        assert!(outcome.is_rejected());
        assert_eq!(outcome.value(), None);
        assert_eq!(outcome.reason().map(String::as_str), Some("boom"));
    }

    #[test]
    fn test_from_result() {
        let ok: Settlement<i32, String> = Ok(1).into();
        let err: Settlement<i32, String> = Err("no".to_string()).into();
        assert_eq!(ok, Settlement::Fulfilled(1));
        assert_eq!(err, Settlement::Rejected("no".to_string()));
    }

    #[test]
    fn test_into_result() {
        let outcome: Settlement<i32, String> = Settlement::Rejected("no".to_string());
        assert_eq!(outcome.into_result(), Err("no".to_string()));
    }
}
