//! Exchange rate types.

use cambio_shared::types::Currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange rate between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// Currency being sold.
    pub base_currency: Currency,
    /// Currency being bought.
    pub quote_currency: Currency,
    /// 1 base = `rate` quote.
    pub rate: Decimal,
    /// When the rate was published.
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Returns the rate for the opposite direction.
    ///
    /// Returns `None` for a zero rate.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let rate = Decimal::ONE.checked_div(self.rate)?;
        Some(Self {
            base_currency: self.quote_currency,
            quote_currency: self.base_currency,
            rate: rate.round_dp(8),
            updated_at: self.updated_at,
        })
    }
}

/// Priced exchange ready to be debited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeQuote {
    /// Source amount.
    pub amount: Decimal,
    /// Rate applied.
    pub rate: Decimal,
    /// Amount in the target currency.
    pub converted_amount: Decimal,
    /// Fee in the source currency.
    pub fee: Decimal,
    /// `amount + fee`, taken from the wallet.
    pub total_debit: Decimal,
}
