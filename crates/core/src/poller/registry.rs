//! Registry of running confirmation polls, keyed by payment reference.
//!
//! Starting a poll for a reference that is already waiting returns the
//! existing handle. Cancelling one reference never touches another.
//! Finished polls stay readable until `finished_ttl` has passed.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::policy::PollPolicy;
use super::runner::ConfirmationPoller;
use super::state::PollSnapshot;
use super::Verifier;

/// How long finished polls remain queryable.
pub const DEFAULT_FINISHED_TTL: Duration = Duration::from_secs(600);

/// Caller's view of one poll.
#[derive(Clone)]
pub struct PollHandle {
    reference: String,
    state: watch::Receiver<PollSnapshot>,
    cancel: CancellationToken,
}

impl PollHandle {
    /// Reference being polled.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> PollSnapshot {
        self.state.borrow().clone()
    }

    /// Requests cancellation. Takes effect at the next pause.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits until the poll reaches a terminal state.
    pub async fn wait(&mut self) -> PollSnapshot {
        if let Ok(snapshot) = self.state.wait_for(|s| s.state.is_terminal()).await {
            return snapshot.clone();
        }
        self.state.borrow().clone()
    }
}

/// Tracks confirmation polls by reference.
pub struct PollRegistry {
    policy: PollPolicy,
    finished_ttl: Duration,
    polls: DashMap<String, PollHandle>,
    shutdown: CancellationToken,
}

impl PollRegistry {
    /// Creates a registry whose polls follow `policy`.
    ///
    /// Cancelling `shutdown` stops every poll started through it.
    #[must_use]
    pub fn new(policy: PollPolicy, shutdown: CancellationToken) -> Self {
        Self {
            policy,
            finished_ttl: DEFAULT_FINISHED_TTL,
            polls: DashMap::new(),
            shutdown,
        }
    }

    /// Overrides how long finished polls stay queryable.
    #[must_use]
    pub const fn with_finished_ttl(mut self, ttl: Duration) -> Self {
        self.finished_ttl = ttl;
        self
    }

    /// Policy applied to new polls.
    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Starts polling `reference`, or returns the poll already waiting on it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, reference: &str, verifier: Arc<dyn Verifier>) -> PollHandle {
        self.evict_finished();

        match self.polls.entry(reference.to_string()) {
            Entry::Occupied(entry) if !entry.get().snapshot().state.is_terminal() => {
                debug!(reference, "Confirmation poll already running");
                entry.get().clone()
            }
            entry => {
                let handle = self.spawn(reference, verifier);
                match entry {
                    Entry::Occupied(mut occupied) => {
                        occupied.insert(handle.clone());
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(handle.clone());
                    }
                }
                handle
            }
        }
    }

    /// Current state of the poll for `reference`, if one is known.
    #[must_use]
    pub fn status(&self, reference: &str) -> Option<PollSnapshot> {
        self.evict_finished();
        self.polls.get(reference).map(|handle| handle.snapshot())
    }

    /// Cancels the poll for `reference`. Returns false if none is running.
    pub fn cancel(&self, reference: &str) -> bool {
        match self.polls.get(reference) {
            Some(handle) if !handle.snapshot().state.is_terminal() => {
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    /// Number of polls still waiting.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.polls
            .iter()
            .filter(|entry| !entry.value().snapshot().state.is_terminal())
            .count()
    }

    fn spawn(&self, reference: &str, verifier: Arc<dyn Verifier>) -> PollHandle {
        let (tx, rx) = watch::channel(PollSnapshot::idle());
        let cancel = self.shutdown.child_token();
        let poller = ConfirmationPoller::new(self.policy, verifier);

        let task_reference = reference.to_string();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            poller.run(&task_reference, task_cancel, &tx).await;
        });

        PollHandle {
            reference: reference.to_string(),
            state: rx,
            cancel,
        }
    }

    fn evict_finished(&self) {
        let ttl = self.finished_ttl;
        self.polls.retain(|_, handle| {
            handle
                .snapshot()
                .finished_at
                .is_none_or(|at| at.elapsed() < ttl)
        });
    }
}
