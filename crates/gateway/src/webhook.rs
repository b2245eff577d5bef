//! Paystack webhook verification.
//!
//! Paystack signs each webhook body with HMAC-SHA512 keyed by the account's
//! secret key and sends the hex digest in `x-paystack-signature`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

use cambio_core::gateway::TransferStatus;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Returns true if `signature` is the hex HMAC-SHA512 of `body` under `secret`.
///
/// The comparison is constant time.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the signature Paystack would send for `body`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// A webhook delivery.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Event name, e.g. `charge.success`.
    pub event: String,
    /// Event payload.
    pub data: serde_json::Value,
}

impl WebhookEvent {
    /// The transaction reference the event is about, if any.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.data.get("reference").and_then(serde_json::Value::as_str)
    }

    /// True for events that settle a charge.
    #[must_use]
    pub fn is_charge(&self) -> bool {
        self.event.starts_with("charge.")
    }

    /// True for payout outcome events.
    #[must_use]
    pub fn is_transfer(&self) -> bool {
        self.event.starts_with("transfer.")
    }

    /// The payout outcome a `transfer.*` event reports, if it is final.
    #[must_use]
    pub fn transfer_outcome(&self) -> Option<TransferStatus> {
        match self.event.as_str() {
            "transfer.success" => Some(TransferStatus::Success),
            "transfer.failed" | "transfer.reversed" => Some(TransferStatus::Failed),
            _ => None,
        }
    }

    /// Provider's explanation for a payout outcome.
    #[must_use]
    pub fn transfer_reason(&self) -> String {
        self.data
            .get("reason")
            .and_then(serde_json::Value::as_str)
            .filter(|reason| !reason.is_empty())
            .map_or_else(|| format!("Payout {}", self.event), str::to_string)
    }
}
