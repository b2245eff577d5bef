//! Subscription plan routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use cambio_core::coupon::{CouponError, CouponService, Discount};
use cambio_core::subscription::SubscriptionService;
use cambio_core::transaction::{TransactionLifecycle, TransactionType as CoreType};
use cambio_core::wallet::WalletOperation;
use cambio_db::entities::{coupons, plans, sea_orm_active_enums::TransactionType};
use cambio_db::repositories::{
    CouponRepository, NewTransaction, PlanRepoError, PlanRepository, TransactionRepository,
    WalletRepository,
};

use super::payments::{
    Confirmation, VerifyRequest, confirm, current_user, open_checkout, owned_payment,
};
use crate::{
    AppState,
    dto::{PlanView, SubscriptionView},
    error::ApiError,
    middleware::AuthUser,
    settlement::reward_referral_in,
};

/// Creates public plan routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/plans", get(list_plans))
}

/// Creates plan routes that need a signed-in user.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/plans/subscribe/payment", post(subscribe_with_gateway))
        .route("/plans/subscribe/verify", post(verify_subscription))
        .route("/plans/subscribe/wallet", post(subscribe_with_wallet))
        .route("/plans/subscription", get(current_subscription))
        .route("/plans/subscription/cancel", post(cancel_subscription))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest {
    plan_id: Uuid,
    coupon_code: Option<String>,
}

/// A plan purchase priced with its optional coupon.
struct Purchase {
    plan: plans::Model,
    coupon: Option<(coupons::Model, Discount)>,
    charge: Decimal,
}

impl Purchase {
    fn coupon_metadata(&self) -> serde_json::Value {
        self.coupon.as_ref().map_or(serde_json::Value::Null, |(coupon, discount)| {
            json!({
                "code": coupon.code,
                "discount": discount.discount,
                "final_amount": discount.final_amount,
            })
        })
    }
}

/// GET /plans - Plans currently on sale.
async fn list_plans(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let plans: Vec<PlanView> = PlanRepository::new((*state.db).clone())
        .list_active()
        .await?
        .into_iter()
        .map(PlanView::from)
        .collect();

    Ok(Json(json!({ "plans": plans })))
}

/// POST /plans/subscribe/payment - Buy a plan through the payment gateway.
///
/// A purchase that costs nothing after its coupon is activated immediately.
async fn subscribe_with_gateway(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &auth).await?;
    let purchase = price(&state, &payload).await?;

    if purchase.charge.is_zero() {
        let txn = state.db.begin().await?;
        let subscription = PlanRepository::activate_in(&txn, user.id, &purchase.plan, None).await?;
        if let Some((coupon, discount)) = &purchase.coupon {
            CouponRepository::redeem_in(&txn, coupon.id, user.id, None, discount).await?;
        }
        txn.commit().await?;

        info!(user_id = %user.id, plan_id = %purchase.plan.id, "Free subscription activated");
        return Ok((
            StatusCode::CREATED,
            Json(json!({ "subscription": SubscriptionView::new(subscription, purchase.plan) })),
        ));
    }

    let txn = state.db.begin().await?;
    let transaction = TransactionRepository::create_pending_in(
        &txn,
        NewTransaction::new(
            user.id,
            CoreType::Subscription,
            purchase.charge,
            &purchase.plan.currency,
        )
        .with_reference(TransactionLifecycle::generate_reference(CoreType::Subscription))
        .with_metadata(json!({
            "gateway": "paystack",
            "plan_id": purchase.plan.id,
            "coupon": purchase.coupon_metadata(),
        })),
    )
    .await?;
    PlanRepository::create_pending_in(&txn, user.id, &purchase.plan, transaction.id).await?;
    if let Some((coupon, discount)) = &purchase.coupon {
        CouponRepository::redeem_in(&txn, coupon.id, user.id, Some(transaction.id), discount)
            .await?;
    }
    txn.commit().await?;

    let checkout = open_checkout(&state, &user.email, &transaction).await?;

    info!(
        user_id = %user.id,
        plan_id = %purchase.plan.id,
        reference = %checkout.reference,
        charge = %purchase.charge,
        "Subscription payment initialized"
    );

    Ok((StatusCode::OK, Json(json!(checkout))))
}

/// POST /plans/subscribe/verify - Confirm a gateway plan payment.
async fn verify_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction =
        owned_payment(&state, &auth, &payload.reference, TransactionType::Subscription).await?;

    match confirm(&state, &transaction).await? {
        Confirmation::Completed(_) => {
            let subscription = PlanRepository::new((*state.db).clone())
                .find_active_for_user(auth.user_id())
                .await?
                .map(|(subscription, plan)| SubscriptionView::new(subscription, plan));
            Ok((
                StatusCode::OK,
                Json(json!({ "status": "completed", "subscription": subscription })),
            ))
        }
        Confirmation::Pending(reference) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "pending", "reference": reference })),
        )),
    }
}

/// POST /plans/subscribe/wallet - Buy a plan from the wallet balance.
///
/// The debit, the subscription, the coupon use and any referral commission
/// commit together.
async fn subscribe_with_wallet(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &auth).await?;
    let purchase = price(&state, &payload).await?;

    if !purchase.charge.is_zero() && user.currency != purchase.plan.currency {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "currency_mismatch",
            format!(
                "This plan is priced in {}, your wallet holds {}",
                purchase.plan.currency, user.currency
            ),
        ));
    }

    let txn = state.db.begin().await?;
    let (balance, payment_id) = if purchase.charge.is_zero() {
        (user.wallet_balance, None)
    } else {
        let balance = WalletRepository::apply_in(
            &txn,
            user.id,
            WalletOperation::Subscription(purchase.charge),
        )
        .await?;
        let payment = TransactionRepository::create_completed_in(
            &txn,
            NewTransaction::new(
                user.id,
                CoreType::Subscription,
                purchase.charge,
                &purchase.plan.currency,
            )
            .with_reference(TransactionLifecycle::generate_reference(CoreType::Subscription))
            .with_metadata(json!({
                "source": "wallet",
                "plan_id": purchase.plan.id,
                "coupon": purchase.coupon_metadata(),
            })),
        )
        .await?;
        (balance, Some(payment.id))
    };

    let subscription =
        PlanRepository::activate_in(&txn, user.id, &purchase.plan, payment_id).await?;
    if let Some((coupon, discount)) = &purchase.coupon {
        CouponRepository::redeem_in(&txn, coupon.id, user.id, payment_id, discount).await?;
    }
    if let Some(payment_id) = payment_id {
        reward_referral_in(&txn, user.id, &purchase.plan, purchase.charge, payment_id).await?;
    }
    txn.commit().await?;

    info!(
        user_id = %user.id,
        plan_id = %purchase.plan.id,
        charge = %purchase.charge,
        "Subscription paid from wallet"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "subscription": SubscriptionView::new(subscription, purchase.plan),
            "walletBalance": balance
        })),
    ))
}

/// GET /plans/subscription - The user's active subscription, if any.
async fn current_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = PlanRepository::new((*state.db).clone())
        .find_active_for_user(auth.user_id())
        .await?
        .map(|(subscription, plan)| SubscriptionView::new(subscription, plan));

    Ok(Json(json!({ "subscription": subscription })))
}

/// POST /plans/subscription/cancel - Cancel the active subscription.
///
/// No refund is issued.
async fn cancel_subscription(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PlanRepository::new((*state.db).clone());
    let cancelled = repo.cancel_active(auth.user_id()).await?;
    let plan = repo
        .find_by_id(cancelled.plan_id)
        .await?
        .ok_or(PlanRepoError::NotFound(cancelled.plan_id))?;

    Ok(Json(json!({ "subscription": SubscriptionView::new(cancelled, plan) })))
}

/// Loads the plan and coupon of a purchase and computes what it costs.
async fn price(state: &AppState, payload: &SubscribeRequest) -> Result<Purchase, ApiError> {
    let plan = PlanRepository::new((*state.db).clone())
        .find_by_id(payload.plan_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Plan not found"))?;

    let coupon = match payload
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(code) => {
            let coupon = CouponRepository::new((*state.db).clone())
                .find_by_code(code)
                .await?
                .ok_or_else(|| CouponError::NotFound(CouponService::normalize_code(code)))?;
            let discount = CouponService::validate(&coupon.rules(), plan.price, Utc::now())?;
            Some((coupon, discount))
        }
        None => None,
    };

    let charge = SubscriptionService::charge(&plan.terms(), coupon.as_ref().map(|(_, d)| d))?;

    Ok(Purchase {
        plan,
        coupon,
        charge,
    })
}
