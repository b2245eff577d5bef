//! Coupon routes for customers.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use cambio_core::coupon::{CouponError, CouponService};
use cambio_db::repositories::CouponRepository;
use cambio_shared::types::Currency;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates coupon routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/coupons/validate", post(validate_coupon))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateCouponRequest {
    code: String,
    amount: Decimal,
    currency: Option<String>,
}

/// POST /coupons/validate - Preview a coupon against a purchase amount.
///
/// Nothing is redeemed here; the use is reserved when a payment is started.
async fn validate_coupon(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(code) = payload.currency.as_deref() {
        code.parse::<Currency>().map_err(ApiError::validation)?;
    }

    let code = CouponService::normalize_code(&payload.code);
    let coupon = CouponRepository::new((*state.db).clone())
        .find_by_code(&code)
        .await?
        .ok_or_else(|| CouponError::NotFound(code.clone()))?;

    let discount = CouponService::validate(&coupon.rules(), payload.amount, Utc::now())?;

    Ok(Json(json!({
        "valid": true,
        "code": coupon.code,
        "type": coupon.coupon_type,
        "discount": discount.discount,
        "finalAmount": discount.final_amount
    })))
}
