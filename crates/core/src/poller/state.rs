//! Poll states.

use tokio::time::Instant;

/// Where a poll is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Registered, not yet running.
    Idle,
    /// Sleeping before, or performing, the given attempt (1-based).
    Waiting {
        /// Attempt in progress.
        attempt: u32,
    },
    /// Payment confirmed.
    Success,
    /// Terminal failure, with the last message seen.
    Error {
        /// Reason surfaced to the caller.
        message: String,
    },
    /// Stopped on request.
    Cancelled,
}

impl PollState {
    /// Returns true once no further attempts will be made.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error { .. } | Self::Cancelled)
    }

    /// Short name used in API responses.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting { .. } => "waiting",
            Self::Success => "success",
            Self::Error { .. } => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Observable state of a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSnapshot {
    /// Current state.
    pub state: PollState,
    /// Verification attempts completed.
    pub attempts: u32,
    /// Set when the state became terminal.
    pub finished_at: Option<Instant>,
}

impl PollSnapshot {
    /// A poll that has not started.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            state: PollState::Idle,
            attempts: 0,
            finished_at: None,
        }
    }

    /// Error message, if the poll failed.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match &self.state {
            PollState::Error { message } => Some(message),
            _ => None,
        }
    }
}
