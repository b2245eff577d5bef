//! Subscription domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a plan is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Being prepared, not purchasable.
    Draft,
    /// Purchasable.
    Active,
    /// Withdrawn from sale.
    Inactive,
}

/// Lifecycle of a user's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserPlanStatus {
    /// Current subscription.
    Active,
    /// Ended by the user.
    Cancelled,
    /// Superseded or past `expires_at`.
    Expired,
    /// Awaiting payment.
    Pending,
}

/// The commercial terms of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTerms {
    /// List price.
    pub price: Decimal,
    /// Days one purchase lasts.
    pub duration_days: i32,
    /// Percent of the charge paid to the referrer.
    pub referral_commission_rate: Decimal,
    /// Sale status.
    pub status: PlanStatus,
}
