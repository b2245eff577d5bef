//! Gateway error types.

use thiserror::Error;

/// Failures talking to the payment provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, timeout, 5xx, or an unreadable body.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the request.
    #[error("{0}")]
    Rejected(String),
}

impl GatewayError {
    /// Returns true if asking again later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
