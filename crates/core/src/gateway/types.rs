//! Gateway request and response types.

use cambio_shared::types::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalised state of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Money received.
    Success,
    /// Not yet decided.
    Pending,
    /// Declined or reversed.
    Failed,
}

/// Checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeRequest {
    /// Amount in major units.
    pub amount: Decimal,
    /// Charge currency.
    pub currency: Currency,
    /// Payer email.
    pub email: String,
    /// Our reference for the pending transaction.
    pub reference: String,
}

/// Checkout created by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializedPayment {
    /// Hosted payment page.
    pub authorization_url: String,
    /// Reference the provider will report back.
    pub reference: String,
}

/// Result of verifying a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVerification {
    /// Normalised status.
    pub status: ChargeStatus,
    /// Amount charged, in major units.
    pub amount: Decimal,
    /// Charge currency.
    pub currency: Currency,
    /// Reference verified.
    pub reference: String,
    /// Provider's human-readable message.
    pub gateway_response: Option<String>,
}

/// Payout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Destination account.
    pub account_number: String,
    /// Destination bank.
    pub bank_code: String,
    /// Account holder name.
    pub account_name: String,
    /// Amount in major units.
    pub amount: Decimal,
    /// Payout currency.
    pub currency: Currency,
    /// Our reference for the withdrawal.
    pub reference: String,
}

/// Provider-side state of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Paid out.
    Success,
    /// Queued by the provider.
    Pending,
    /// Waiting for OTP confirmation on the provider dashboard.
    Otp,
    /// Payout failed.
    Failed,
}

impl TransferStatus {
    /// Returns true if the provider took responsibility for the payout.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Success | Self::Pending | Self::Otp)
    }
}

/// Payout acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Provider's transfer code.
    pub transfer_reference: String,
    /// Provider-side state.
    pub status: TransferStatus,
}

/// Resolved bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAccount {
    /// Account number queried.
    pub account_number: String,
    /// Holder name on record.
    pub account_name: String,
}

/// A bank that accepts payouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    /// Display name.
    pub name: String,
    /// Provider bank code.
    pub code: String,
}
