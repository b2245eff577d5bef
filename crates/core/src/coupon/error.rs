//! Coupon rejection reasons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a coupon cannot be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouponError {
    /// No coupon with that code.
    #[error("Coupon {0} not found")]
    NotFound(String),

    /// Coupon is switched off.
    #[error("Coupon is not active")]
    Inactive,

    /// Redemption window has not opened.
    #[error("Coupon is not valid until {0}")]
    NotStarted(DateTime<Utc>),

    /// Redemption window has closed.
    #[error("Coupon expired at {0}")]
    Expired(DateTime<Utc>),

    /// Redemption limit reached.
    #[error("Coupon has reached its redemption limit")]
    Exhausted,

    /// Purchase is below the coupon's minimum.
    #[error("Coupon requires a minimum purchase of {minimum}, got {amount}")]
    MinimumNotMet {
        /// Required minimum.
        minimum: Decimal,
        /// Purchase amount offered.
        amount: Decimal,
    },

    /// Purchase amounts must be positive.
    #[error("Purchase amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    /// Coupon definition is malformed.
    #[error("Invalid coupon definition: {0}")]
    InvalidDefinition(String),
}

impl CouponError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "coupon_not_found",
            Self::Inactive => "coupon_inactive",
            Self::NotStarted(_) => "coupon_not_started",
            Self::Expired(_) => "coupon_expired",
            Self::Exhausted => "coupon_exhausted",
            Self::MinimumNotMet { .. } => "coupon_minimum_not_met",
            Self::InvalidAmount(_) | Self::InvalidDefinition(_) => "validation_error",
        }
    }
}
