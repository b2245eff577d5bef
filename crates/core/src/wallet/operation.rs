//! Signed wallet operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::WalletError;

/// Decimal places of the stored wallet balance.
pub const BALANCE_PLACES: u32 = 2;

/// A balance change with a fixed direction.
///
/// Amounts are always given as positive values; the variant decides the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletOperation {
    /// Confirmed gateway deposit.
    Deposit(Decimal),
    /// Incoming side of a transfer.
    TransferIn(Decimal),
    /// Outgoing side of a transfer, including the sender's fee.
    TransferOut {
        /// Amount received by the recipient.
        amount: Decimal,
        /// Fee charged to the sender.
        fee: Decimal,
    },
    /// Referral commission.
    ReferralCredit(Decimal),
    /// Payout to a bank account.
    Withdrawal(Decimal),
    /// Currency exchange, debited with its fee.
    Exchange {
        /// Source amount.
        amount: Decimal,
        /// Exchange fee.
        fee: Decimal,
    },
    /// Plan purchase paid from the wallet.
    Subscription(Decimal),
    /// Return of a previously debited amount.
    Refund(Decimal),
    /// Administrative credit.
    AdminCredit(Decimal),
    /// Administrative debit.
    AdminDebit(Decimal),
}

impl WalletOperation {
    /// Returns the signed delta this operation applies.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::InvalidAmount` if an amount is not positive or a
    /// fee is negative, and `WalletError::TooPrecise` if either has digits
    /// below the minor unit.
    pub fn delta(&self) -> Result<Decimal, WalletError> {
        match *self {
            Self::Deposit(amount)
            | Self::TransferIn(amount)
            | Self::ReferralCredit(amount)
            | Self::Refund(amount)
            | Self::AdminCredit(amount) => positive(amount),
            Self::Withdrawal(amount) | Self::Subscription(amount) | Self::AdminDebit(amount) => {
                positive(amount).map(|a| -a)
            }
            Self::TransferOut { amount, fee } | Self::Exchange { amount, fee } => {
                let amount = positive(amount)?;
                if fee < Decimal::ZERO {
                    return Err(WalletError::InvalidAmount(fee));
                }
                let fee = minor_units(fee)?;
                Ok(-(amount + fee))
            }
        }
    }

    /// Returns true if the operation adds to the balance.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::Deposit(_)
                | Self::TransferIn(_)
                | Self::ReferralCredit(_)
                | Self::Refund(_)
                | Self::AdminCredit(_)
        )
    }
}

fn positive(amount: Decimal) -> Result<Decimal, WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(amount));
    }
    minor_units(amount)
}

// Postgres rounds every NUMERIC(20,2) write on its own, so a sub-kobo debit and
// its matching credit would not cancel out.
fn minor_units(amount: Decimal) -> Result<Decimal, WalletError> {
    if amount.normalize().scale() > BALANCE_PLACES {
        Err(WalletError::TooPrecise(amount))
    } else {
        Ok(amount)
    }
}

/// Applies a signed delta to a balance, refusing to go below zero.
///
/// # Errors
///
/// Returns `WalletError::ZeroDelta` for a zero delta and
/// `WalletError::InsufficientFunds` when the result would be negative.
pub fn apply_delta(balance: Decimal, delta: Decimal) -> Result<Decimal, WalletError> {
    if delta.is_zero() {
        return Err(WalletError::ZeroDelta);
    }
    let next = balance + delta;
    if next < Decimal::ZERO {
        return Err(WalletError::InsufficientFunds {
            balance,
            required: -delta,
        });
    }
    Ok(next)
}

/// Administrative wallet action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "amount", rename_all = "snake_case")]
pub enum AdminAdjustment {
    /// Credit the wallet.
    Add(Decimal),
    /// Debit the wallet.
    Subtract(Decimal),
    /// Overwrite the balance.
    Set(Decimal),
}

impl AdminAdjustment {
    /// Resolves the adjustment into a wallet operation against `current`.
    ///
    /// Returns `None` for a `Set` that leaves the balance unchanged.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::InvalidAmount` for non-positive add/subtract
    /// amounts, `WalletError::NegativeBalance` for a negative `Set`, and
    /// `WalletError::TooPrecise` for any value below the minor unit.
    pub fn resolve(self, current: Decimal) -> Result<Option<WalletOperation>, WalletError> {
        match self {
            Self::Add(amount) => positive(amount).map(|a| Some(WalletOperation::AdminCredit(a))),
            Self::Subtract(amount) => {
                positive(amount).map(|a| Some(WalletOperation::AdminDebit(a)))
            }
            Self::Set(target) => {
                if target < Decimal::ZERO {
                    return Err(WalletError::NegativeBalance(target));
                }
                let target = minor_units(target)?;
                let diff = target - current;
                Ok(if diff > Decimal::ZERO {
                    Some(WalletOperation::AdminCredit(diff))
                } else if diff < Decimal::ZERO {
                    Some(WalletOperation::AdminDebit(-diff))
                } else {
                    None
                })
            }
        }
    }
}
