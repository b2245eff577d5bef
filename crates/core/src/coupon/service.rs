//! Coupon validation service.
//!
//! Checks run in a fixed order so the first failing rule is the one reported:
//! status, time window, redemption limit, minimum purchase.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::CouponError;
use super::types::{CouponRules, CouponStatus, CouponType, Discount};
use crate::wallet::BALANCE_PLACES;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Stateless coupon rules.
pub struct CouponService;

impl CouponService {
    /// Normalises a user-entered code: trimmed and upper-cased.
    #[must_use]
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Validates `coupon` for a purchase of `amount` at `now` and computes the discount.
    ///
    /// Both window bounds are inclusive.
    pub fn validate(
        coupon: &CouponRules,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Discount, CouponError> {
        if amount <= Decimal::ZERO {
            return Err(CouponError::InvalidAmount(amount));
        }

        if coupon.status != CouponStatus::Active {
            return Err(CouponError::Inactive);
        }

        if let Some(starts_at) = coupon.starts_at
            && now < starts_at
        {
            return Err(CouponError::NotStarted(starts_at));
        }
        if let Some(ends_at) = coupon.ends_at
            && now > ends_at
        {
            return Err(CouponError::Expired(ends_at));
        }

        if let Some(max) = coupon.max_redemptions
            && coupon.usage_count >= max
        {
            return Err(CouponError::Exhausted);
        }

        if let Some(minimum) = coupon.min_purchase_amount
            && amount < minimum
        {
            return Err(CouponError::MinimumNotMet { minimum, amount });
        }

        Ok(Self::calculate_discount(coupon.kind, coupon.value, amount))
    }

    /// Computes the discount of a coupon kind/value against `amount`.
    ///
    /// Percentages round to 2 dp with banker's rounding. The discount never
    /// exceeds the purchase.
    #[must_use]
    pub fn calculate_discount(kind: CouponType, value: Decimal, amount: Decimal) -> Discount {
        let raw = match kind {
            CouponType::Percentage => (amount * value / HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
            CouponType::Fixed => value,
            CouponType::FreeTrial => amount,
        };
        let discount = raw.max(Decimal::ZERO).min(amount);

        Discount {
            discount,
            final_amount: amount - discount,
        }
    }

    /// Checks an administrator-supplied coupon definition.
    pub fn validate_definition(
        kind: CouponType,
        value: Decimal,
        max_redemptions: Option<i32>,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<(), CouponError> {
        match kind {
            CouponType::Percentage if value <= Decimal::ZERO || value > HUNDRED => {
                return Err(CouponError::InvalidDefinition(
                    "percentage must be between 0 and 100".into(),
                ));
            }
            CouponType::Fixed if value <= Decimal::ZERO => {
                return Err(CouponError::InvalidDefinition(
                    "fixed discount must be positive".into(),
                ));
            }
            CouponType::Fixed if value.normalize().scale() > BALANCE_PLACES => {
                return Err(CouponError::InvalidDefinition(
                    "fixed discount cannot go below the minor unit".into(),
                ));
            }
            _ => {}
        }

        if max_redemptions.is_some_and(|max| max < 0) {
            return Err(CouponError::InvalidDefinition(
                "max redemptions cannot be negative".into(),
            ));
        }

        if let (Some(start), Some(end)) = (starts_at, ends_at)
            && end < start
        {
            return Err(CouponError::InvalidDefinition(
                "ends_at must not precede starts_at".into(),
            ));
        }

        Ok(())
    }
}
