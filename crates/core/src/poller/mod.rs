//! Server-side payment confirmation polling.
//!
//! A poll repeatedly asks a [`Verifier`] whether a payment reference has been
//! settled, waiting a fixed interval between attempts, until it is confirmed,
//! fails terminally, runs out of attempts, or is cancelled.
//!
//! # Modules
//!
//! - `state` - Poll states and snapshots
//! - `policy` - Interval, attempt budget, and jitter
//! - `runner` - The polling loop
//! - `registry` - Per-reference poll tracking and cancellation

pub mod policy;
pub mod registry;
pub mod runner;
pub mod state;

#[cfg(test)]
mod runner_props;

use async_trait::async_trait;

pub use policy::PollPolicy;
pub use registry::{PollHandle, PollRegistry};
pub use runner::ConfirmationPoller;
pub use state::{PollSnapshot, PollState};

/// Outcome of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Settled successfully. Polling stops.
    Confirmed,
    /// Settled as failed. Polling stops.
    Failed(String),
    /// Not decided yet, or the gateway could not be reached.
    Retry(String),
}

/// Checks one payment reference.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Performs a single verification attempt for `reference`.
    async fn verify(&self, reference: &str) -> Verification;
}
