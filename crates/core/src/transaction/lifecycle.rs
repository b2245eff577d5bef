//! Transaction creation checks and the single allowed status transition.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use cambio_shared::types::Currency;

use super::error::TransactionError;
use super::types::{Outcome, TransactionStatus, TransactionType};
use crate::wallet::operation::BALANCE_PLACES;

/// Stateless rules for the transaction lifecycle.
pub struct TransactionLifecycle;

impl TransactionLifecycle {
    /// Validates the inputs of a new pending transaction.
    ///
    /// Returns the normalised (upper-case) currency code. The amount may not
    /// carry digits below the currency's minor unit.
    pub fn validate_new(amount: Decimal, currency: &str) -> Result<String, TransactionError> {
        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount(amount));
        }

        let code = currency.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TransactionError::InvalidCurrency(currency.to_string()));
        }

        let places = code
            .parse::<Currency>()
            .map_or(BALANCE_PLACES, Currency::decimal_places);
        if amount.normalize().scale() > places {
            return Err(TransactionError::TooPrecise(amount));
        }

        Ok(code)
    }

    /// Checks a fee: zero or positive, in whole minor units.
    pub fn validate_fee(fee: Decimal) -> Result<Decimal, TransactionError> {
        if fee < Decimal::ZERO {
            return Err(TransactionError::InvalidAmount(fee));
        }
        if fee.normalize().scale() > BALANCE_PLACES {
            return Err(TransactionError::TooPrecise(fee));
        }
        Ok(fee)
    }

    /// Computes the status after applying `outcome` to a transaction in `current`.
    ///
    /// # Returns
    /// * `Ok(status)` when `current` is `Pending`
    /// * `Err(TransactionError::InvalidState)` for any terminal status
    pub fn finalize(
        current: TransactionStatus,
        outcome: Outcome,
    ) -> Result<TransactionStatus, TransactionError> {
        match current {
            TransactionStatus::Pending => Ok(outcome.status()),
            _ => Err(TransactionError::InvalidState {
                from: current,
                to: outcome.status(),
            }),
        }
    }

    /// Returns true if `from → to` is a legal transition.
    #[must_use]
    pub fn is_valid_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
        from == TransactionStatus::Pending && to.is_terminal()
    }

    /// Merges `extra` into `base`. Keys in `extra` overwrite.
    ///
    /// A non-object `base` is replaced by an object.
    #[must_use]
    pub fn merge_metadata(base: Value, extra: Value) -> Value {
        let mut merged = match base {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(extra) = extra {
            merged.extend(extra);
        }
        Value::Object(merged)
    }

    /// Generates a unique gateway reference such as `cmb_dep_0192…`.
    #[must_use]
    pub fn generate_reference(kind: TransactionType) -> String {
        format!("cmb_{}_{}", kind.reference_tag(), Uuid::now_v7().simple())
    }
}
