//! Wallet error types.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by wallet mutations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The debit would take the balance below zero.
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Balance at the time of the attempt.
        balance: Decimal,
        /// Amount the operation needed.
        required: Decimal,
    },

    /// Operation amounts must be strictly positive.
    #[error("Wallet amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    /// Amounts finer than the minor unit cannot be stored exactly.
    #[error("Wallet amount {0} has digits below the minor unit")]
    TooPrecise(Decimal),

    /// A zero delta is never a meaningful mutation.
    #[error("Wallet delta must be non-zero")]
    ZeroDelta,

    /// Balances cannot be set below zero.
    #[error("Wallet balance cannot be set to {0}")]
    NegativeBalance(Decimal),

    /// The wallet owner does not exist.
    #[error("User {0} not found")]
    UserNotFound(Uuid),
}
