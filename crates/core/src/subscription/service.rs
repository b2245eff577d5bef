//! Subscription rules.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::error::SubscriptionError;
use super::types::{PlanStatus, PlanTerms, UserPlanStatus};
use crate::coupon::Discount;
use crate::wallet::BALANCE_PLACES;

/// Stateless subscription rules.
pub struct SubscriptionService;

impl SubscriptionService {
    /// Amount to charge for `plan`, after an optional coupon discount.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::PlanNotActive` unless the plan is on sale.
    pub fn charge(plan: &PlanTerms, discount: Option<&Discount>) -> Result<Decimal, SubscriptionError> {
        if plan.status != PlanStatus::Active {
            return Err(SubscriptionError::PlanNotActive);
        }
        Ok(discount.map_or(plan.price, |d| d.final_amount))
    }

    /// Returns `(started_at, expires_at)` for a subscription activated at `now`.
    #[must_use]
    pub fn activation_window(now: DateTime<Utc>, duration_days: i32) -> (DateTime<Utc>, DateTime<Utc>) {
        (now, now + Duration::days(i64::from(duration_days.max(1))))
    }

    /// Checks that a subscription in `status` may be cancelled.
    pub fn ensure_cancellable(status: UserPlanStatus) -> Result<(), SubscriptionError> {
        match status {
            UserPlanStatus::Active => Ok(()),
            other => Err(SubscriptionError::NotCancellable(other)),
        }
    }

    /// Checks an administrator-supplied plan definition.
    pub fn validate_terms(plan: &PlanTerms) -> Result<(), SubscriptionError> {
        if plan.price < Decimal::ZERO {
            return Err(SubscriptionError::InvalidPlan("price cannot be negative".into()));
        }
        if plan.price.normalize().scale() > BALANCE_PLACES {
            return Err(SubscriptionError::InvalidPlan(
                "price cannot go below the minor unit".into(),
            ));
        }
        if plan.duration_days <= 0 {
            return Err(SubscriptionError::InvalidPlan(
                "duration must be at least one day".into(),
            ));
        }
        if plan.referral_commission_rate < Decimal::ZERO
            || plan.referral_commission_rate > Decimal::ONE_HUNDRED
        {
            return Err(SubscriptionError::InvalidCommissionRate(
                plan.referral_commission_rate,
            ));
        }
        Ok(())
    }
}
