//! Property-based tests for coupon discounts.

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::coupon::service::CouponService;
use crate::coupon::types::CouponType;

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=100_000_000).prop_map(|minor| Decimal::new(minor, 2))
}

fn arb_kind() -> impl Strategy<Value = CouponType> {
    prop_oneof![
        Just(CouponType::Percentage),
        Just(CouponType::Fixed),
        Just(CouponType::FreeTrial),
    ]
}

fn arb_value() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000).prop_map(|v| Decimal::new(v, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The discount is bounded by the purchase and the parts add up.
    #[test]
    fn prop_discount_bounded(kind in arb_kind(), value in arb_value(), amount in arb_amount()) {
        let discount = CouponService::calculate_discount(kind, value, amount);
        prop_assert!(discount.discount >= Decimal::ZERO);
        prop_assert!(discount.discount <= amount);
        prop_assert_eq!(discount.discount + discount.final_amount, amount);
        prop_assert!(discount.discount.scale() <= 2 || kind != CouponType::Percentage);
    }

    /// Free trials always bring the charge to zero.
    #[test]
    fn prop_free_trial_is_free(amount in arb_amount()) {
        let discount = CouponService::calculate_discount(CouponType::FreeTrial, Decimal::ZERO, amount);
        prop_assert_eq!(discount.final_amount, Decimal::ZERO);
    }
}
