//! Paystack wire types.
//!
//! Every Paystack response is wrapped in `{ status, message, data }`.
//! Amounts are integers in the currency's minor unit.

use cambio_core::gateway::{ChargeStatus, TransferStatus};
use serde::{Deserialize, Serialize};

/// Standard Paystack response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// False for business-level rejections.
    pub status: bool,
    /// Human-readable outcome.
    #[serde(default)]
    pub message: String,
    /// Payload, absent on failure.
    pub data: Option<T>,
}

/// Body of `POST /transaction/initialize`.
#[derive(Debug, Serialize)]
pub struct InitializeBody<'a> {
    /// Minor units.
    pub amount: i64,
    /// Payer email.
    pub email: &'a str,
    /// ISO code.
    pub currency: &'a str,
    /// Our reference.
    pub reference: &'a str,
    /// Redirect after checkout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<&'a str>,
}

/// `data` of `POST /transaction/initialize`.
#[derive(Debug, Deserialize)]
pub struct InitializeData {
    /// Hosted checkout URL.
    pub authorization_url: String,
    /// Reference echoed back.
    pub reference: String,
}

/// `data` of `GET /transaction/verify/:reference`.
#[derive(Debug, Deserialize)]
pub struct VerifyData {
    /// Raw Paystack status.
    pub status: String,
    /// Minor units.
    pub amount: i64,
    /// ISO code.
    pub currency: String,
    /// Reference verified.
    pub reference: String,
    /// Processor message.
    #[serde(default)]
    pub gateway_response: Option<String>,
}

/// Body of `POST /transferrecipient`.
#[derive(Debug, Serialize)]
pub struct RecipientBody<'a> {
    /// Always `nuban` for bank accounts.
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// Holder name.
    pub name: &'a str,
    /// Account number.
    pub account_number: &'a str,
    /// Bank code.
    pub bank_code: &'a str,
    /// ISO code.
    pub currency: &'a str,
}

/// `data` of `POST /transferrecipient`.
#[derive(Debug, Deserialize)]
pub struct RecipientData {
    /// Recipient handle used by `/transfer`.
    pub recipient_code: String,
}

/// Body of `POST /transfer`.
#[derive(Debug, Serialize)]
pub struct TransferBody<'a> {
    /// Always `balance`.
    pub source: &'a str,
    /// Minor units.
    pub amount: i64,
    /// From `/transferrecipient`.
    pub recipient: &'a str,
    /// Our reference.
    pub reference: &'a str,
    /// Shown on the recipient's statement.
    pub reason: &'a str,
    /// ISO code.
    pub currency: &'a str,
}

/// `data` of `POST /transfer`.
#[derive(Debug, Deserialize)]
pub struct TransferData {
    /// Paystack transfer code.
    pub transfer_code: String,
    /// Raw Paystack status.
    pub status: String,
}

/// `data` of `GET /bank/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveData {
    /// Account number.
    pub account_number: String,
    /// Holder name.
    pub account_name: String,
}

/// One entry of `GET /bank`.
#[derive(Debug, Deserialize)]
pub struct BankData {
    /// Display name.
    pub name: String,
    /// Bank code.
    pub code: String,
    /// Hidden banks are skipped.
    #[serde(default)]
    pub active: Option<bool>,
}

/// Maps a Paystack transaction status onto the normalised charge status.
///
/// `abandoned` is a checkout that was opened but not paid yet; the customer
/// can still complete it, so it stays pending until reconciliation gives up.
#[must_use]
pub fn charge_status(raw: &str) -> ChargeStatus {
    match raw {
        "success" => ChargeStatus::Success,
        "failed" | "reversed" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

/// Maps a Paystack transfer status onto the normalised transfer status.
#[must_use]
pub fn transfer_status(raw: &str) -> TransferStatus {
    match raw {
        "success" => TransferStatus::Success,
        "otp" => TransferStatus::Otp,
        "failed" | "reversed" | "abandoned" | "rejected" => TransferStatus::Failed,
        _ => TransferStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("success", ChargeStatus::Success)]
    #[case("failed", ChargeStatus::Failed)]
    #[case("abandoned", ChargeStatus::Pending)]
    #[case("reversed", ChargeStatus::Failed)]
    #[case("ongoing", ChargeStatus::Pending)]
    #[case("processing", ChargeStatus::Pending)]
    #[case("queued", ChargeStatus::Pending)]
    fn test_charge_status(#[case] raw: &str, #[case] expected: ChargeStatus) {
        assert_eq!(charge_status(raw), expected);
    }

    #[rstest]
    #[case("success", TransferStatus::Success)]
    #[case("otp", TransferStatus::Otp)]
    #[case("pending", TransferStatus::Pending)]
    #[case("failed", TransferStatus::Failed)]
    fn test_transfer_status(#[case] raw: &str, #[case] expected: TransferStatus) {
        assert_eq!(transfer_status(raw), expected);
    }

    #[test]
    fn test_envelope_failure_without_data() {
        let envelope: Envelope<VerifyData> =
            serde_json::from_str(r#"{"status":false,"message":"Transaction reference not found"}"#)
                .unwrap();
        assert!(!envelope.status);
        assert!(envelope.data.is_none());
    }
}
