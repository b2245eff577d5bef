//! Referral codes and commission.

use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Characters used in referral codes. Ambiguous glyphs (0/O, 1/I) are left out.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated referral codes.
pub const REFERRAL_CODE_LEN: usize = 8;

/// State of a referral relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    /// Referred user has not yet paid.
    Pending,
    /// Commission credited.
    Rewarded,
    /// Referral voided.
    Cancelled,
}

/// Generates a random referral code.
#[must_use]
pub fn generate_referral_code() -> String {
    let mut rng = rand::rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Commission owed on a charge at `rate` percent, rounded to 2 dp.
#[must_use]
pub fn referral_commission(charge: Decimal, rate: Decimal) -> Decimal {
    if charge <= Decimal::ZERO || rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (charge * rate / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_commission() {
        assert_eq!(referral_commission(dec!(1800), dec!(10)), dec!(180));
        assert_eq!(referral_commission(dec!(999.99), dec!(7.5)), dec!(75.00));
        assert_eq!(referral_commission(dec!(0), dec!(10)), dec!(0));
        assert_eq!(referral_commission(dec!(1800), dec!(0)), dec!(0));
    }
}
