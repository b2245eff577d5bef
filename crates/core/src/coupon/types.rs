//! Coupon domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a coupon's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// `value` percent off the purchase.
    Percentage,
    /// `value` off the purchase, never more than the purchase.
    Fixed,
    /// The whole purchase is waived.
    FreeTrial,
}

/// Whether a coupon can currently be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    /// Redeemable.
    Active,
    /// Switched off by an administrator.
    Inactive,
}

/// The fields of a coupon that validation depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRules {
    /// Upper-case code.
    pub code: String,
    /// Discount kind.
    pub kind: CouponType,
    /// Percent or fixed amount.
    pub value: Decimal,
    /// Lifecycle status.
    pub status: CouponStatus,
    /// `None` means unlimited.
    pub max_redemptions: Option<i32>,
    /// Redemptions so far.
    pub usage_count: i32,
    /// Smallest purchase the coupon applies to.
    pub min_purchase_amount: Option<Decimal>,
    /// Inclusive start, `None` means always started.
    pub starts_at: Option<DateTime<Utc>>,
    /// Inclusive end, `None` means never ends.
    pub ends_at: Option<DateTime<Utc>>,
}

/// Result of applying a coupon to a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    /// Amount taken off.
    pub discount: Decimal,
    /// Amount left to pay.
    pub final_amount: Decimal,
}
