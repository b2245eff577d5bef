//! Payment provider webhooks.
//!
//! The body is read raw because the signature covers the exact bytes sent.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde_json::json;
use tracing::{debug, info, warn};

use cambio_core::gateway::TransferStatus;
use cambio_gateway::{SIGNATURE_HEADER, WebhookEvent, verify_signature};

use crate::{AppState, error::ApiError, settlement::{Settled, SettlementError}};

/// Creates webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/paystack", post(paystack))
}

/// POST /webhooks/paystack - Signed event delivery from Paystack.
///
/// A signed delivery is acknowledged with 200 unless settlement hits an
/// internal error; Paystack then redelivers, and settling twice is harmless.
/// Charge events settle deposits and subscriptions. Final transfer events
/// settle withdrawals, refunding failed or reversed payouts.
async fn paystack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(&state.payments.webhook_secret, &body, signature) {
        warn!("Rejected webhook with invalid signature");
        return Err(ApiError::unauthorized(
            "invalid_signature",
            "Webhook signature is invalid",
        ));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Malformed webhook body: {e}")))?;

    let Some(reference) = event.reference() else {
        debug!(event = %event.event, "Webhook without reference ignored");
        return Ok((StatusCode::OK, Json(json!({ "received": true }))));
    };

    if event.is_charge() {
        match state.settlement().settle(reference).await {
            Ok(Settled::Completed(_)) => info!(reference, "Payment settled by webhook"),
            Ok(Settled::Failed { reason, .. }) => {
                info!(reference, %reason, "Payment failed by webhook");
            }
            Ok(Settled::Pending | Settled::AlreadyFinal(_)) => {
                debug!(reference, event = %event.event, "Webhook changed nothing");
            }
            Err(SettlementError::NotFound(_)) => {
                warn!(reference, "Webhook for unknown reference");
            }
            Err(e) => {
                // Let Paystack redeliver; the reconciler is the fallback.
                warn!(reference, error = %e, "Webhook settlement failed");
                return Err(e.into());
            }
        }
    } else if let Some(outcome) = event.transfer_outcome() {
        let reason = event.transfer_reason();
        match state.settlement().settle_payout(reference, outcome, &reason).await {
            Ok(Settled::Completed(_)) => info!(reference, "Payout confirmed by webhook"),
            Ok(Settled::Failed { .. }) => {
                info!(reference, %reason, "Payout failed by webhook, wallet refunded");
            }
            Ok(Settled::AlreadyFinal(row)) if outcome == TransferStatus::Failed => {
                // A reversal after completion needs a person; status never moves back.
                warn!(
                    reference,
                    status = ?row.status,
                    event = %event.event,
                    "Payout failure reported for a settled withdrawal"
                );
            }
            Ok(Settled::Pending | Settled::AlreadyFinal(_)) => {
                debug!(reference, event = %event.event, "Webhook changed nothing");
            }
            Err(SettlementError::NotFound(_)) => {
                warn!(reference, "Payout webhook for unknown withdrawal");
            }
            Err(e) => {
                warn!(reference, error = %e, "Payout webhook settlement failed");
                return Err(e.into());
            }
        }
    } else if event.is_transfer() {
        info!(reference, event = %event.event, "Payout event received");
    } else {
        debug!(reference, event = %event.event, "Unhandled webhook event");
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}
