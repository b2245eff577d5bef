//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Access denied.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Conflict (e.g., duplicate entry).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Wallet balance cannot cover the requested debit.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Coupon cannot be applied.
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    /// Operation requires a transaction that is still pending.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The payment gateway refused the request.
    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// The payment gateway could not be reached or failed.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule(_)
            | Self::InsufficientFunds(_)
            | Self::InvalidCoupon(_)
            | Self::GatewayRejected(_) => 422,
            Self::Conflict(_) | Self::InvalidState(_) => 409,
            Self::GatewayUnavailable(_) => 502,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::BusinessRule(_) => "business_rule_violation",
            Self::Conflict(_) => "conflict",
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::InvalidCoupon(_) => "invalid_coupon",
            Self::InvalidState(_) => "invalid_state",
            Self::GatewayRejected(_) => "gateway_rejected",
            Self::GatewayUnavailable(_) => "gateway_unavailable",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Returns true if the details must not be shown to API clients.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}
