//! Property-based tests for the transaction lifecycle.

use proptest::prelude::*;

use crate::transaction::lifecycle::TransactionLifecycle;
use crate::transaction::types::{Outcome, TransactionStatus};

fn arb_status() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![
        Just(TransactionStatus::Pending),
        Just(TransactionStatus::Completed),
        Just(TransactionStatus::Failed),
        Just(TransactionStatus::Cancelled),
    ]
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Completed),
        Just(Outcome::Failed),
        Just(Outcome::Cancelled),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Only pending transactions can be finalized.
    #[test]
    fn prop_finalize_succeeds_iff_pending(status in arb_status(), outcome in arb_outcome()) {
        let result = TransactionLifecycle::finalize(status, outcome);
        prop_assert_eq!(result.is_ok(), status == TransactionStatus::Pending);
    }

    /// A finalized transaction never returns to pending, and a second finalize always fails.
    #[test]
    fn prop_finalized_status_is_terminal(first in arb_outcome(), second in arb_outcome()) {
        let status = TransactionLifecycle::finalize(TransactionStatus::Pending, first).unwrap();
        prop_assert!(status.is_terminal());
        prop_assert!(TransactionLifecycle::finalize(status, second).is_err());
    }

    /// The transition table agrees with finalize.
    #[test]
    fn prop_transition_table_matches_finalize(from in arb_status(), outcome in arb_outcome()) {
        let to = outcome.status();
        prop_assert_eq!(
            TransactionLifecycle::is_valid_transition(from, to),
            TransactionLifecycle::finalize(from, outcome).is_ok()
        );
        prop_assert!(!TransactionLifecycle::is_valid_transition(from, TransactionStatus::Pending));
    }
}
