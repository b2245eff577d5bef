//! Transaction error types.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::TransactionStatus;

/// Errors raised while recording or finalizing transactions.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction is no longer pending.
    #[error("Transaction cannot move from {from} to {to}")]
    InvalidState {
        /// Status found.
        from: TransactionStatus,
        /// Status requested.
        to: TransactionStatus,
    },

    /// Finalize matched no pending row.
    #[error("Transaction {0} is not pending")]
    NotPending(Uuid),

    /// Amounts must be strictly positive.
    #[error("Transaction amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    /// Amounts and fees must be whole minor units of the currency.
    #[error("Transaction amount {0} has digits below the minor unit")]
    TooPrecise(Decimal),

    /// Currency must be a three-letter ISO code.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// Transaction not found.
    #[error("Transaction {0} not found")]
    NotFound(String),
}
