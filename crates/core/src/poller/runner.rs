//! The confirmation polling loop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::PollPolicy;
use super::state::{PollSnapshot, PollState};
use super::{Verification, Verifier};

/// Drives one reference through verification attempts.
pub struct ConfirmationPoller {
    policy: PollPolicy,
    verifier: Arc<dyn Verifier>,
}

impl ConfirmationPoller {
    /// Creates a poller for `verifier` under `policy`.
    #[must_use]
    pub fn new(policy: PollPolicy, verifier: Arc<dyn Verifier>) -> Self {
        Self { policy, verifier }
    }

    /// Polls `reference` until a terminal state, publishing every change on `state`.
    ///
    /// Each attempt is preceded by one pause. Cancellation is honoured during
    /// pauses; an attempt already talking to the gateway runs to completion.
    pub async fn run(
        &self,
        reference: &str,
        cancel: CancellationToken,
        state: &watch::Sender<PollSnapshot>,
    ) -> PollState {
        let mut attempts = 0;
        let mut last_message = String::from("payment not confirmed");

        for attempt in 1..=self.policy.max_attempts {
            publish(state, PollState::Waiting { attempt }, attempts);

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(reference, attempt, "Confirmation poll cancelled");
                    return publish(state, PollState::Cancelled, attempts);
                }
                () = tokio::time::sleep(self.policy.next_delay()) => {}
            }

            let outcome = self.verifier.verify(reference).await;
            attempts = attempt;

            match outcome {
                Verification::Confirmed => {
                    info!(reference, attempts, "Payment confirmed by poll");
                    return publish(state, PollState::Success, attempts);
                }
                Verification::Failed(message) => {
                    warn!(reference, attempts, %message, "Payment failed during poll");
                    return publish(state, PollState::Error { message }, attempts);
                }
                Verification::Retry(message) => {
                    debug!(reference, attempt, %message, "Payment not yet confirmed");
                    last_message = message;
                }
            }
        }

        warn!(
            reference,
            attempts,
            message = %last_message,
            "Confirmation poll exhausted its attempts"
        );
        publish(
            state,
            PollState::Error {
                message: last_message,
            },
            attempts,
        )
    }
}

fn publish(sender: &watch::Sender<PollSnapshot>, state: PollState, attempts: u32) -> PollState {
    let finished_at = state.is_terminal().then(Instant::now);
    sender.send_replace(PollSnapshot {
        state: state.clone(),
        attempts,
        finished_at,
    });
    state
}
