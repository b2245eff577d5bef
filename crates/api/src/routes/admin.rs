//! Administrative routes.
//!
//! Every handler asks the central policy table through
//! [`AuthUser::require`] before touching data.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use cambio_core::auth::{Action, UserRole};
use cambio_core::coupon::{CouponError, CouponType};
use cambio_core::exchange::ExchangeError;
use cambio_core::subscription::PlanStatus;
use cambio_core::transaction::{
    Outcome, TransactionError, TransactionLifecycle, TransactionType as CoreType,
};
use cambio_core::wallet::{AdminAdjustment, WalletOperation};
use cambio_db::entities::sea_orm_active_enums::{TransactionStatus, TransactionType};
use cambio_db::repositories::{
    CouponRepository, CreateCouponInput, CreatePlanInput, ExchangeRateRepository, NewTransaction,
    PlanRepository, TransactionRepository, UpdateCouponInput, UpdatePlanInput, UserFilter,
    UserRepository, WalletRepository, exchange_rate::to_domain,
};
use cambio_shared::types::{Currency, PageRequest};

use super::{empty_as_none, payments::TransactionQuery};
use crate::{
    AppState,
    dto::{CouponView, PlanView, TransactionView, UserView},
    error::ApiError,
    middleware::AuthUser,
};

/// Creates admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/coupons", get(list_coupons).post(create_coupon))
        .route(
            "/admin/coupons/{id}",
            get(get_coupon).patch(update_coupon).delete(deactivate_coupon),
        )
        .route("/admin/plans", get(list_plans).post(create_plan))
        .route("/admin/plans/{id}", patch(update_plan))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}/status", patch(set_user_status))
        .route("/admin/users/{id}/role", patch(set_user_role))
        .route("/admin/users/{id}/wallet", post(adjust_wallet))
        .route("/admin/transactions", get(list_transactions))
        .route("/admin/exchange-rates", put(upsert_exchange_rate))
        .route("/admin/exchanges/{id}/complete", post(complete_exchange))
        .route("/admin/exchanges/{id}/cancel", post(cancel_exchange))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateCouponRequest {
    #[validate(length(min = 3, max = 32))]
    code: String,
    #[serde(rename = "type")]
    kind: CouponType,
    #[serde(default)]
    value: Decimal,
    max_redemptions: Option<i32>,
    min_purchase_amount: Option<Decimal>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    is_stackable: bool,
}

/// Absent fields stay untouched; an explicit `null` clears the field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCouponRequest {
    value: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    max_redemptions: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    min_purchase_amount: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    starts_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    ends_at: Option<Option<DateTime<Utc>>>,
    is_active: Option<bool>,
    is_stackable: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    description: Option<String>,
    price: Decimal,
    currency: Option<String>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default = "default_plan_status")]
    status: PlanStatus,
    #[serde(default)]
    referral_commission_rate: Decimal,
    #[serde(default = "default_duration_days")]
    duration_days: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePlanRequest {
    description: Option<String>,
    price: Option<Decimal>,
    features: Option<Vec<String>>,
    status: Option<PlanStatus>,
    referral_commission_rate: Option<Decimal>,
    duration_days: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    limit: Option<u64>,
    offset: Option<u64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    role: Option<String>,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role: UserRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WalletAction {
    Add,
    Subtract,
    Set,
}

#[derive(Debug, Deserialize)]
struct WalletRequest {
    action: WalletAction,
    amount: Decimal,
    reason: Option<String>,
}

impl WalletRequest {
    const fn adjustment(&self) -> AdminAdjustment {
        match self.action {
            WalletAction::Add => AdminAdjustment::Add(self.amount),
            WalletAction::Subtract => AdminAdjustment::Subtract(self.amount),
            WalletAction::Set => AdminAdjustment::Set(self.amount),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateRequest {
    base_currency: Currency,
    quote_currency: Currency,
    rate: Decimal,
}

const fn default_plan_status() -> PlanStatus {
    PlanStatus::Active
}

const fn default_duration_days() -> i32 {
    30
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Coupons
// ============================================================================

/// GET /admin/coupons - List coupons.
async fn list_coupons(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManageCoupons)?;

    let page = PageRequest::from_query(query.limit, query.offset);
    let result = CouponRepository::new((*state.db).clone())
        .list(page)
        .await?
        .map(CouponView::from);

    Ok(Json(json!({
        "coupons": result.items,
        "total": result.total,
        "limit": result.limit,
        "offset": result.offset
    })))
}

/// POST /admin/coupons - Create a coupon.
async fn create_coupon(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManageCoupons)?;
    payload.validate()?;

    let coupon = CouponRepository::new((*state.db).clone())
        .create(CreateCouponInput {
            code: payload.code,
            kind: payload.kind,
            value: payload.value,
            max_redemptions: payload.max_redemptions,
            min_purchase_amount: payload.min_purchase_amount,
            starts_at: payload.starts_at,
            ends_at: payload.ends_at,
            is_stackable: payload.is_stackable,
        })
        .await?;

    info!(admin_id = %auth.user_id(), code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(CouponView::from(coupon))))
}

/// GET /admin/coupons/{id} - Get one coupon.
async fn get_coupon(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManageCoupons)?;

    let coupon = CouponRepository::new((*state.db).clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| CouponError::NotFound(id.to_string()))?;

    Ok(Json(CouponView::from(coupon)))
}

/// PATCH /admin/coupons/{id} - Edit a coupon.
async fn update_coupon(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManageCoupons)?;

    let coupon = CouponRepository::new((*state.db).clone())
        .update(
            id,
            UpdateCouponInput {
                value: payload.value,
                max_redemptions: payload.max_redemptions,
                min_purchase_amount: payload.min_purchase_amount,
                starts_at: payload.starts_at,
                ends_at: payload.ends_at,
                is_active: payload.is_active,
                is_stackable: payload.is_stackable,
            },
        )
        .await?;

    info!(admin_id = %auth.user_id(), coupon_id = %id, "Coupon updated");
    Ok(Json(CouponView::from(coupon)))
}

/// DELETE /admin/coupons/{id} - Switch a coupon off.
async fn deactivate_coupon(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManageCoupons)?;

    let coupon = CouponRepository::new((*state.db).clone())
        .deactivate(id)
        .await?;

    info!(admin_id = %auth.user_id(), coupon_id = %id, "Coupon deactivated");
    Ok(Json(CouponView::from(coupon)))
}

// ============================================================================
// Plans
// ============================================================================

/// GET /admin/plans - List every plan, including drafts.
async fn list_plans(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManagePlans)?;

    let plans: Vec<PlanView> = PlanRepository::new((*state.db).clone())
        .list_all()
        .await?
        .into_iter()
        .map(PlanView::from)
        .collect();

    Ok(Json(json!({ "plans": plans })))
}

/// POST /admin/plans - Create a plan.
async fn create_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreatePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManagePlans)?;
    payload.validate()?;

    let currency = match payload.currency.as_deref() {
        Some(code) => code.parse::<Currency>().map_err(ApiError::validation)?,
        None => Currency::Ngn,
    };

    let plan = PlanRepository::new((*state.db).clone())
        .create(CreatePlanInput {
            name: payload.name.trim().to_string(),
            description: payload.description,
            price: payload.price,
            currency: currency.code().to_string(),
            features: payload.features,
            status: payload.status,
            referral_commission_rate: payload.referral_commission_rate,
            duration_days: payload.duration_days,
        })
        .await?;

    info!(admin_id = %auth.user_id(), plan_id = %plan.id, "Plan created");
    Ok((StatusCode::CREATED, Json(PlanView::from(plan))))
}

/// PATCH /admin/plans/{id} - Edit a plan.
async fn update_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManagePlans)?;

    let plan = PlanRepository::new((*state.db).clone())
        .update(
            id,
            UpdatePlanInput {
                description: payload.description,
                price: payload.price,
                features: payload.features,
                status: payload.status,
                referral_commission_rate: payload.referral_commission_rate,
                duration_days: payload.duration_days,
            },
        )
        .await?;

    info!(admin_id = %auth.user_id(), plan_id = %id, "Plan updated");
    Ok(Json(PlanView::from(plan)))
}

// ============================================================================
// Users and wallets
// ============================================================================

/// GET /admin/users - Search users.
async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ViewUsers)?;

    let filter = UserFilter {
        search: query.search,
        role: query
            .role
            .as_deref()
            .map(str::parse::<UserRole>)
            .transpose()
            .map_err(ApiError::validation)?,
        is_active: query.is_active,
    };
    let page = PageRequest::from_query(query.limit, query.offset);

    let result = UserRepository::new((*state.db).clone())
        .list(&filter, page)
        .await?
        .map(UserView::from);

    Ok(Json(json!({
        "users": result.items,
        "total": result.total,
        "limit": result.limit,
        "offset": result.offset
    })))
}

/// PATCH /admin/users/{id}/status - Enable or disable an account.
async fn set_user_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::SetUserStatus)?;
    if id == auth.user_id() {
        return Err(ApiError::validation("You cannot change your own status"));
    }

    let repo = UserRepository::new((*state.db).clone());
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let user = repo.set_active(id, payload.is_active).await?;

    info!(admin_id = %auth.user_id(), user_id = %id, is_active = payload.is_active, "User status changed");
    Ok(Json(UserView::from(user)))
}

/// PATCH /admin/users/{id}/role - Change a user's role.
async fn set_user_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ChangeUserRole)?;
    if id == auth.user_id() {
        return Err(ApiError::validation("You cannot change your own role"));
    }

    let repo = UserRepository::new((*state.db).clone());
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let user = repo.set_role(id, payload.role).await?;

    info!(admin_id = %auth.user_id(), user_id = %id, role = %payload.role, "User role changed");
    Ok(Json(UserView::from(user)))
}

/// POST /admin/users/{id}/wallet - Credit, debit, or overwrite a wallet.
///
/// Every change is recorded as a completed transaction tagged with
/// `source: admin`.
async fn adjust_wallet(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<WalletRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::AdjustWallet)?;

    let user = UserRepository::new((*state.db).clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let txn = state.db.begin().await?;
    let change = WalletRepository::adjust_in(&txn, id, payload.adjustment()).await?;

    let transaction = match change.operation {
        Some(operation) => {
            let (kind, amount) = match operation {
                WalletOperation::AdminCredit(amount) => (CoreType::Deposit, amount),
                WalletOperation::AdminDebit(amount) => (CoreType::Withdrawal, amount),
                other => {
                    return Err(ApiError::internal(
                        "Unexpected admin wallet operation",
                        format!("{other:?}"),
                    ));
                }
            };
            let row = TransactionRepository::create_completed_in(
                &txn,
                NewTransaction::new(id, kind, amount, &user.currency)
                    .with_reference(TransactionLifecycle::generate_reference(kind))
                    .with_metadata(json!({
                        "source": "admin",
                        "admin_id": auth.user_id(),
                        "reason": payload.reason,
                        "previous_balance": change.previous,
                    })),
            )
            .await?;
            Some(TransactionView::from(row))
        }
        None => None,
    };
    txn.commit().await?;

    info!(
        admin_id = %auth.user_id(),
        user_id = %id,
        previous = %change.previous,
        current = %change.current,
        "Wallet adjusted by admin"
    );

    Ok(Json(json!({
        "previousBalance": change.previous,
        "walletBalance": change.current,
        "transaction": transaction
    })))
}

/// GET /admin/transactions - Transactions of every user.
async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ViewTransactions)?;

    let (filter, page) = query.into_filter(None)?;
    let result = TransactionRepository::new((*state.db).clone())
        .list(&filter, page)
        .await?
        .map(TransactionView::from);

    Ok(Json(json!({
        "transactions": result.items,
        "total": result.total,
        "limit": result.limit,
        "offset": result.offset
    })))
}

// ============================================================================
// Exchange
// ============================================================================

/// PUT /admin/exchange-rates - Publish a rate.
///
/// The rate is stored, cached, and pushed to every open rate stream.
async fn upsert_exchange_rate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<RateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ManageExchangeRates)?;

    let row = ExchangeRateRepository::new((*state.db).clone())
        .upsert(
            payload.base_currency,
            payload.quote_currency,
            payload.rate,
            Some(auth.user_id()),
        )
        .await?;

    let rate = to_domain(&row).ok_or(ExchangeError::RateUnavailable {
        base: payload.base_currency,
        quote: payload.quote_currency,
    })?;
    state.rates.publish(rate.clone()).await;

    Ok(Json(rate))
}

/// POST /admin/exchanges/{id}/complete - Mark an exchange as paid out.
async fn complete_exchange(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::SettleExchanges)?;
    pending_exchange(&state, id).await?;

    let completed = TransactionRepository::new((*state.db).clone())
        .finalize(
            id,
            Outcome::Completed,
            json!({ "settled_by": auth.user_id() }),
        )
        .await?;

    info!(admin_id = %auth.user_id(), transaction_id = %id, "Exchange completed");
    Ok(Json(TransactionView::from(completed)))
}

/// POST /admin/exchanges/{id}/cancel - Cancel an exchange and refund the wallet.
///
/// The refund covers the amount and the fee, and commits with the status
/// change.
async fn cancel_exchange(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::SettleExchanges)?;
    pending_exchange(&state, id).await?;

    let txn = state.db.begin().await?;
    let cancelled = TransactionRepository::finalize_in(
        &txn,
        id,
        Outcome::Cancelled,
        json!({ "cancelled_by": auth.user_id() }),
    )
    .await?;
    let balance = WalletRepository::apply_in(
        &txn,
        cancelled.user_id,
        WalletOperation::Refund(cancelled.amount + cancelled.fees),
    )
    .await?;
    txn.commit().await?;

    info!(
        admin_id = %auth.user_id(),
        transaction_id = %id,
        refunded = %(cancelled.amount + cancelled.fees),
        "Exchange cancelled"
    );

    Ok(Json(json!({
        "transaction": TransactionView::from(cancelled),
        "walletBalance": balance
    })))
}

async fn pending_exchange(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    let transaction = TransactionRepository::new((*state.db).clone())
        .find_by_id(id)
        .await?
        .filter(|t| t.transaction_type == TransactionType::Exchange)
        .ok_or_else(|| TransactionError::NotFound(id.to_string()))?;

    if transaction.status == TransactionStatus::Pending {
        Ok(())
    } else {
        Err(TransactionError::NotPending(id).into())
    }
}
