//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

/// Represents a monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major units (e.g., naira, not kobo).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// ISO 4217 currency codes supported for wallets and exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Nigerian Naira
    Ngn,
    /// US Dollar
    Usd,
    /// British Pound
    Gbp,
    /// Euro
    Eur,
    /// Ghanaian Cedi
    Ghs,
    /// Kenyan Shilling
    Kes,
    /// South African Rand
    Zar,
}

impl Currency {
    /// Every supported currency.
    pub const ALL: [Self; 7] = [
        Self::Ngn,
        Self::Usd,
        Self::Gbp,
        Self::Eur,
        Self::Ghs,
        Self::Kes,
        Self::Zar,
    ];

    /// Returns the ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ngn => "NGN",
            Self::Usd => "USD",
            Self::Gbp => "GBP",
            Self::Eur => "EUR",
            Self::Ghs => "GHS",
            Self::Kes => "KES",
            Self::Zar => "ZAR",
        }
    }

    /// Number of decimal places in the currency's minor unit.
    #[must_use]
    pub const fn decimal_places(self) -> u32 {
        2
    }
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Builds an amount from minor units (kobo, cents) as used by gateways.
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: Currency) -> Self {
        Self {
            amount: Decimal::new(minor, currency.decimal_places()),
            currency,
        }
    }

    /// Converts to integer minor units, rounding half-even to the minor unit.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        let places = self.currency.decimal_places();
        let rounded = self
            .amount
            .round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven);
        (rounded * Decimal::from(10_i64.pow(places))).to_i64()
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == upper)
            .ok_or_else(|| format!("Unknown currency: {s}"))
    }
}
