//! Referral routes.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde_json::json;

use cambio_db::repositories::{ReferralRepository, referral::total_earned};

use super::payments::current_user;
use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates referral routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/referrals", get(list_referrals))
}

/// GET /referrals - The user's referral code and the people they brought in.
async fn list_referrals(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &auth).await?;
    let referrals = ReferralRepository::new((*state.db).clone())
        .list_for_referrer(user.id)
        .await?;

    let total = total_earned(&referrals);
    let items: Vec<_> = referrals
        .into_iter()
        .map(|r| {
            json!({
                "id": r.referral.id,
                "username": r.referred_username,
                "status": r.referral.status,
                "commissionAmount": r.referral.commission_amount,
                "createdAt": r.referral.created_at
            })
        })
        .collect();

    Ok(Json(json!({
        "referralCode": user.referral_code,
        "currency": user.currency,
        "referrals": items,
        "totalEarned": total
    })))
}
