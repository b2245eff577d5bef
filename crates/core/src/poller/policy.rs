//! Polling policy.

use std::time::Duration;

use cambio_shared::config::ConfirmationConfig;
use rand::Rng;

/// Default pause between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5_000);

/// Default attempt budget, about one minute at the default interval.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 12;

/// Interval, attempt budget, and jitter for confirmation polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed pause before each attempt.
    pub interval: Duration,
    /// Attempts made before giving up.
    pub max_attempts: u32,
    /// Upper bound of random extra delay added to each pause.
    pub jitter: Duration,
}

impl PollPolicy {
    /// Creates a policy without jitter.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            jitter: Duration::ZERO,
        }
    }

    /// Adds jitter to every pause.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Pause before the next attempt.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let max = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        self.interval + Duration::from_millis(rand::rng().random_range(0..=max))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl From<&ConfirmationConfig> for PollPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.interval_ms),
            config.max_attempts.max(1),
        )
        .with_jitter(Duration::from_millis(config.jitter_ms))
    }
}
