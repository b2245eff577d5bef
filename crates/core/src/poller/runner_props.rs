//! Property-based tests for the poll attempt budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::poller::runner::ConfirmationPoller;
use crate::poller::state::{PollSnapshot, PollState};
use crate::poller::{PollPolicy, Verification, Verifier};

/// Confirms on the `confirm_on`-th call (1-based), retries otherwise.
struct ConfirmOn {
    confirm_on: u32,
    calls: AtomicU32,
}

#[async_trait]
impl Verifier for ConfirmOn {
    async fn verify(&self, _reference: &str) -> Verification {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.confirm_on {
            Verification::Confirmed
        } else {
            Verification::Retry("pending".into())
        }
    }
}

fn run_poll(max_attempts: u32, confirm_on: u32) -> (PollState, u32) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let verifier = Arc::new(ConfirmOn {
            confirm_on,
            calls: AtomicU32::new(0),
        });
        let poller = ConfirmationPoller::new(
            PollPolicy::new(Duration::from_millis(5_000), max_attempts),
            verifier.clone(),
        );
        let (tx, _rx) = watch::channel(PollSnapshot::idle());
        let state = poller.run("ref", CancellationToken::new(), &tx).await;
        (state, verifier.calls.load(Ordering::SeqCst))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The verifier is called exactly min(confirm_on, max_attempts) times,
    /// and the poll succeeds iff confirmation falls within the budget.
    #[test]
    fn prop_attempt_budget_is_exact(max_attempts in 1u32..20, confirm_on in 1u32..30) {
        let (state, calls) = run_poll(max_attempts, confirm_on);

        prop_assert_eq!(calls, confirm_on.min(max_attempts));
        prop_assert_eq!(state == PollState::Success, confirm_on <= max_attempts);
        prop_assert!(state.is_terminal());
    }
}
