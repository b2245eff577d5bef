//! Exchange pricing.

use cambio_shared::types::Currency;
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::ExchangeError;
use super::types::ExchangeQuote;

/// Stateless exchange pricing.
pub struct ExchangeService;

impl ExchangeService {
    /// Converts an amount at `rate`, rounded to `decimal_places` with banker's rounding.
    #[must_use]
    pub fn convert(amount: Decimal, rate: Decimal, decimal_places: u32) -> Decimal {
        (amount * rate).round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
    }

    /// Fee of `fee_percent` percent on `amount`, rounded to 2 dp.
    #[must_use]
    pub fn fee(amount: Decimal, fee_percent: Decimal) -> Decimal {
        (amount * fee_percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
            .max(Decimal::ZERO)
    }

    /// Prices an exchange of `amount` from `source` into `target`.
    pub fn quote(
        source: Currency,
        target: Currency,
        amount: Decimal,
        rate: Decimal,
        fee_percent: Decimal,
    ) -> Result<ExchangeQuote, ExchangeError> {
        if source == target {
            return Err(ExchangeError::SameCurrency(source));
        }
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(amount));
        }
        if amount.normalize().scale() > source.decimal_places() {
            return Err(ExchangeError::TooPrecise(amount));
        }
        if rate <= Decimal::ZERO {
            return Err(ExchangeError::InvalidRate(rate));
        }

        let fee = Self::fee(amount, fee_percent);
        Ok(ExchangeQuote {
            amount,
            rate,
            converted_amount: Self::convert(amount, rate, target.decimal_places()),
            fee,
            total_debit: amount + fee,
        })
    }
}
