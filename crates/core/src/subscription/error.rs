//! Subscription error types.

use rust_decimal::Decimal;
use thiserror::Error;

use super::types::UserPlanStatus;

/// Errors raised by subscription rules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Plan is not on sale.
    #[error("Plan is not available for purchase")]
    PlanNotActive,

    /// The user has no active subscription.
    #[error("No active subscription")]
    NoActiveSubscription,

    /// Only active subscriptions can be cancelled.
    #[error("Subscription in status {0:?} cannot be cancelled")]
    NotCancellable(UserPlanStatus),

    /// Plan definition is malformed.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Commission rate outside 0–100.
    #[error("Referral commission rate must be between 0 and 100, got {0}")]
    InvalidCommissionRate(Decimal),
}
