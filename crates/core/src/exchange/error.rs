//! Exchange error types.

use cambio_shared::types::Currency;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while pricing an exchange.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    /// Source and target are the same.
    #[error("Cannot exchange {0} into itself")]
    SameCurrency(Currency),

    /// No rate is known for the pair in either direction.
    #[error("No exchange rate for {base}/{quote}")]
    RateUnavailable {
        /// Source currency.
        base: Currency,
        /// Target currency.
        quote: Currency,
    },

    /// Amounts must be positive.
    #[error("Exchange amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    /// The amount has digits below the source currency's minor unit.
    #[error("Exchange amount {0} has digits below the minor unit")]
    TooPrecise(Decimal),

    /// Rates must be positive.
    #[error("Exchange rate must be positive, got {0}")]
    InvalidRate(Decimal),
}
