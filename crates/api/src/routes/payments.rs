//! Deposit, withdrawal, transfer, and transaction history routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use cambio_core::gateway::{GatewayError, InitializeRequest, InitializedPayment, TransferRequest};
use cambio_core::transaction::{
    DateFilter, Outcome, TransactionFilter, TransactionLifecycle, TransactionStatus as CoreStatus,
    TransactionType as CoreType,
};
use cambio_core::wallet::WalletOperation;
use cambio_db::entities::{
    sea_orm_active_enums::{TransactionStatus, TransactionType},
    transactions, users,
};
use cambio_db::repositories::{
    NewTransaction, TransactionRepository, UserRepository, WalletRepository,
};
use cambio_shared::types::{Currency, PageRequest};

use super::{empty_as_none, parse_param};
use crate::{
    AppState,
    dto::TransactionView,
    error::ApiError,
    middleware::AuthUser,
    settlement::Settled,
};

/// Creates payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/deposit/initialize", post(initialize_deposit))
        .route("/payments/deposit/verify", post(verify_deposit))
        .route(
            "/payments/confirmations/{reference}",
            get(confirmation_status).delete(cancel_confirmation),
        )
        .route("/payments/withdraw", post(withdraw))
        .route("/payments/transfer", post(transfer))
        .route("/payments/transactions", get(list_transactions))
        .route("/payments/banks", get(list_banks))
        .route("/payments/banks/resolve", post(resolve_account))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositRequest {
    amount: Decimal,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyRequest {
    pub reference: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct WithdrawRequest {
    amount: Decimal,
    currency: String,
    #[validate(length(min = 6, max = 20))]
    account_number: String,
    #[validate(length(min = 1, max = 20))]
    bank_code: String,
    #[validate(length(min = 1, max = 255))]
    account_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferPayload {
    recipient_username: Option<String>,
    recipient_email: Option<String>,
    recipient_id: Option<Uuid>,
    amount: Decimal,
    #[serde(default)]
    fee: Decimal,
    description: Option<String>,
}

/// Query string of the transaction listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "empty_as_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_filter: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
    pub user_id: Option<Uuid>,
}

impl TransactionQuery {
    /// Builds the repository filter, restricted to `owner` when given.
    pub(crate) fn into_filter(
        self,
        owner: Option<Uuid>,
    ) -> Result<(TransactionFilter, PageRequest), ApiError> {
        let page = PageRequest::from_query(self.limit, self.offset);
        let date_filter: Option<DateFilter> =
            parse_param("dateFilter", self.date_filter.as_deref())?;

        let filter = TransactionFilter {
            user_id: owner.or(self.user_id),
            status: parse_param::<CoreStatus>("status", self.status.as_deref())?,
            kind: parse_param::<CoreType>("type", self.kind.as_deref())?,
            from: self.from,
            to: self.to,
            search: self.search,
        }
        .with_date_filter(date_filter, Utc::now());

        Ok((filter, page))
    }
}

#[derive(Debug, Deserialize)]
struct BanksQuery {
    currency: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest {
    #[validate(length(min = 6, max = 20))]
    account_number: String,
    #[validate(length(min = 1, max = 20))]
    bank_code: String,
}

// ============================================================================
// Deposits
// ============================================================================

/// POST /payments/deposit/initialize - Start a gateway checkout for a deposit.
async fn initialize_deposit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<DepositRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &auth).await?;
    let currency = wallet_currency(&user, payload.currency.as_deref())?;

    let transaction = TransactionRepository::new((*state.db).clone())
        .create_pending(
            NewTransaction::new(user.id, CoreType::Deposit, payload.amount, currency.code())
                .with_reference(TransactionLifecycle::generate_reference(CoreType::Deposit))
                .with_metadata(json!({ "gateway": "paystack" })),
        )
        .await?;

    let checkout = open_checkout(&state, &user.email, &transaction).await?;

    info!(
        user_id = %user.id,
        reference = %checkout.reference,
        amount = %transaction.amount,
        "Deposit initialized"
    );

    Ok(Json(checkout))
}

/// POST /payments/deposit/verify - Confirm a deposit after checkout.
///
/// Returns 202 and keeps polling in the background while the gateway has not
/// decided.
async fn verify_deposit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction =
        owned_payment(&state, &auth, &payload.reference, TransactionType::Deposit).await?;

    match confirm(&state, &transaction).await? {
        Confirmation::Completed(row) => {
            let balance = WalletRepository::new((*state.db).clone())
                .balance(auth.user_id())
                .await?;
            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "completed",
                    "walletBalance": balance,
                    "transaction": TransactionView::from(row)
                })),
            ))
        }
        Confirmation::Pending(reference) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "pending", "reference": reference })),
        )),
    }
}

/// GET /payments/confirmations/{reference} - State of a background confirmation.
async fn confirmation_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_owner(&state, &auth, &reference).await?;

    let snapshot = state
        .polls
        .status(&reference)
        .ok_or_else(|| ApiError::not_found("No confirmation in progress for this reference"))?;

    Ok(Json(json!({
        "reference": reference,
        "state": snapshot.state.label(),
        "attempts": snapshot.attempts,
        "message": snapshot.message()
    })))
}

/// DELETE /payments/confirmations/{reference} - Stop a background confirmation.
///
/// Only the poll for this reference is stopped; the payment itself stays
/// pending and can still be settled by webhook or reconciliation.
async fn cancel_confirmation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_owner(&state, &auth, &reference).await?;

    if !state.polls.cancel(&reference) {
        return Err(ApiError::not_found(
            "No confirmation in progress for this reference",
        ));
    }

    info!(user_id = %auth.user_id(), %reference, "Confirmation cancelled");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Withdrawals and transfers
// ============================================================================

/// POST /payments/withdraw - Pay out from the wallet to a bank account.
///
/// The debit commits before the gateway is called, so the money cannot be
/// spent twice while the payout is in flight. A declined payout is failed
/// and refunded in one database transaction. When Paystack cannot be reached
/// the transfer may still go out, so the withdrawal stays pending (202) until
/// a transfer event settles it.
async fn withdraw(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let user = current_user(&state, &auth).await?;
    let currency = wallet_currency(&user, Some(&payload.currency))?;
    let reference = TransactionLifecycle::generate_reference(CoreType::Withdrawal);

    let txn = state.db.begin().await?;
    WalletRepository::apply_in(&txn, user.id, WalletOperation::Withdrawal(payload.amount)).await?;
    let pending = TransactionRepository::create_pending_in(
        &txn,
        NewTransaction::new(user.id, CoreType::Withdrawal, payload.amount, currency.code())
            .with_reference(reference.clone())
            .with_metadata(json!({
                "gateway": "paystack",
                "bank": {
                    "account_number": payload.account_number,
                    "bank_code": payload.bank_code,
                    "account_name": payload.account_name,
                }
            })),
    )
    .await?;
    txn.commit().await?;

    let payout = state
        .gateway
        .initiate_transfer(TransferRequest {
            account_number: payload.account_number,
            bank_code: payload.bank_code,
            account_name: payload.account_name,
            amount: payload.amount,
            currency,
            reference,
        })
        .await;

    let repo = TransactionRepository::new((*state.db).clone());
    let wallets = WalletRepository::new((*state.db).clone());
    let failure = match payout {
        Ok(receipt) if receipt.status.is_accepted() => {
            let completed = repo
                .finalize(
                    pending.id,
                    Outcome::Completed,
                    json!({
                        "transfer_reference": receipt.transfer_reference,
                        "transfer_status": receipt.status,
                    }),
                )
                .await?;
            let balance = wallets.balance(user.id).await?;

            info!(
                user_id = %user.id,
                transaction_id = %completed.id,
                amount = %completed.amount,
                "Withdrawal completed"
            );
            return Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "completed",
                    "walletBalance": balance,
                    "transaction": TransactionView::from(completed)
                })),
            ));
        }
        Ok(_) => GatewayError::Rejected("The payout was declined".to_string()),
        Err(GatewayError::Unavailable(message)) => {
            let held = repo
                .annotate(pending.id, json!({ "payout_error": message }))
                .await?;
            let balance = wallets.balance(user.id).await?;

            warn!(
                user_id = %user.id,
                transaction_id = %held.id,
                %message,
                "Payout outcome unknown, withdrawal left pending"
            );
            return Ok((
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "pending",
                    "message": "Your withdrawal is being processed",
                    "walletBalance": balance,
                    "transaction": TransactionView::from(held)
                })),
            ));
        }
        Err(e) => e,
    };

    let reason = failure.to_string();
    state.settlement().refund_payout(&pending, &reason).await?;
    warn!(
        user_id = %user.id,
        transaction_id = %pending.id,
        %reason,
        "Withdrawal declined and refunded"
    );
    Err(failure.into())
}

/// POST /payments/transfer - Send money to another user's wallet.
async fn transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TransferPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_repo = UserRepository::new((*state.db).clone());
    let sender = current_user(&state, &auth).await?;

    let found = if let Some(id) = payload.recipient_id {
        user_repo.find_by_id(id).await?
    } else if let Some(username) = non_empty(payload.recipient_username.as_deref()) {
        user_repo.find_by_username(username).await?
    } else if let Some(email) = non_empty(payload.recipient_email.as_deref()) {
        user_repo.find_by_email(email).await?
    } else {
        return Err(ApiError::validation(
            "One of recipientUsername, recipientEmail or recipientId is required",
        ));
    };
    let recipient = found.ok_or_else(|| ApiError::not_found("Recipient not found"))?;

    if recipient.id == sender.id {
        return Err(ApiError::validation("You cannot transfer to yourself"));
    }
    if !recipient.is_active {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "recipient_inactive",
            "The recipient's account is disabled",
        ));
    }
    if recipient.currency != sender.currency {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "currency_mismatch",
            format!(
                "Recipient wallet is in {}, yours is in {}",
                recipient.currency, sender.currency
            ),
        ));
    }

    let debit = WalletOperation::TransferOut {
        amount: payload.amount,
        fee: payload.fee,
    };
    let credit = WalletOperation::TransferIn(payload.amount);
    let out_reference = TransactionLifecycle::generate_reference(CoreType::Transfer);

    let txn = state.db.begin().await?;
    // Rows are updated in id order so opposite transfers cannot deadlock.
    let sender_balance = if sender.id < recipient.id {
        let balance = WalletRepository::apply_in(&txn, sender.id, debit).await?;
        WalletRepository::apply_in(&txn, recipient.id, credit).await?;
        balance
    } else {
        WalletRepository::apply_in(&txn, recipient.id, credit).await?;
        WalletRepository::apply_in(&txn, sender.id, debit).await?
    };

    let outgoing = TransactionRepository::create_completed_in(
        &txn,
        NewTransaction::new(sender.id, CoreType::Transfer, payload.amount, &sender.currency)
            .with_fees(payload.fee)
            .with_reference(out_reference.clone())
            .with_metadata(json!({
                "direction": "out",
                "counterparty_id": recipient.id,
                "description": payload.description,
            })),
    )
    .await?;
    TransactionRepository::create_completed_in(
        &txn,
        NewTransaction::new(recipient.id, CoreType::Transfer, payload.amount, &recipient.currency)
            .with_reference(TransactionLifecycle::generate_reference(CoreType::Transfer))
            .with_metadata(json!({
                "direction": "in",
                "counterparty_id": sender.id,
                "linked_reference": out_reference,
                "description": payload.description,
            })),
    )
    .await?;
    txn.commit().await?;

    info!(
        sender_id = %sender.id,
        recipient_id = %recipient.id,
        amount = %payload.amount,
        fee = %payload.fee,
        "Transfer completed"
    );

    Ok(Json(json!({
        "transfer": {
            "sender": { "walletBalance": sender_balance },
            "recipient": { "username": recipient.username },
            "transactionId": outgoing.id
        }
    })))
}

// ============================================================================
// History and banks
// ============================================================================

/// GET /payments/transactions - The signed-in user's transactions.
async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, page) = query.into_filter(Some(auth.user_id()))?;
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

/// GET /payments/banks - Banks that accept payouts.
async fn list_banks(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<BanksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let currency = match non_empty(query.currency.as_deref()) {
        Some(code) => code.parse::<Currency>().map_err(ApiError::validation)?,
        None => current_user(&state, &auth)
            .await?
            .currency
            .parse::<Currency>()
            .unwrap_or(Currency::Ngn),
    };

    let banks = state.gateway.list_banks(currency).await?;
    Ok(Json(json!({ "banks": banks })))
}

/// POST /payments/banks/resolve - Look up the holder of a bank account.
async fn resolve_account(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(payload): Json<ResolveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let account = state
        .gateway
        .verify_account(&payload.account_number, &payload.bank_code)
        .await?;
    Ok(Json(account))
}

// ============================================================================
// Shared with the plan routes
// ============================================================================

/// Outcome of a user-triggered confirmation.
pub(crate) enum Confirmation {
    /// The payment is completed.
    Completed(transactions::Model),
    /// Still undecided; a background poll now owns the reference.
    Pending(String),
}

/// Settles a payment on the user's behalf.
///
/// A payment the gateway has not decided yet is handed to the poll registry.
pub(crate) async fn confirm(
    state: &AppState,
    transaction: &transactions::Model,
) -> Result<Confirmation, ApiError> {
    let reference = transaction
        .reference
        .clone()
        .ok_or_else(|| ApiError::not_found("Payment has no gateway reference"))?;

    let settlement = state.settlement();
    match settlement.settle(&reference).await? {
        Settled::Completed(row) => Ok(Confirmation::Completed(row)),
        Settled::AlreadyFinal(row) if row.status == TransactionStatus::Completed => {
            Ok(Confirmation::Completed(row))
        }
        Settled::AlreadyFinal(row) => Err(payment_failed(
            row.metadata
                .get("failure_reason")
                .and_then(|v| v.as_str())
                .map_or_else(
                    || format!("Payment {}", CoreStatus::from(row.status)),
                    str::to_string,
                ),
        )),
        Settled::Failed { reason, .. } => Err(payment_failed(reason)),
        Settled::Pending => {
            state.polls.start(&reference, Arc::new(settlement));
            info!(%reference, "Payment pending, confirmation poll started");
            Ok(Confirmation::Pending(reference))
        }
    }
}

/// Opens a hosted checkout for a pending transaction.
///
/// If the gateway refuses, the transaction is failed so it does not linger
/// as pending.
pub(crate) async fn open_checkout(
    state: &AppState,
    email: &str,
    transaction: &transactions::Model,
) -> Result<InitializedPayment, ApiError> {
    let reference = transaction
        .reference
        .clone()
        .ok_or_else(|| ApiError::internal("Checkout without reference", transaction.id))?;
    let currency = transaction
        .currency
        .parse::<Currency>()
        .map_err(|e| ApiError::internal("Stored currency is unknown", e))?;

    let request = InitializeRequest {
        amount: transaction.amount,
        currency,
        email: email.to_string(),
        reference,
    };

    match state.gateway.initialize(request).await {
        Ok(checkout) => {
            TransactionRepository::new((*state.db).clone())
                .annotate(
                    transaction.id,
                    json!({ "authorization_url": checkout.authorization_url }),
                )
                .await?;
            Ok(checkout)
        }
        Err(e) => {
            if let Err(abandon_err) = state.settlement().abandon(transaction, &e.to_string()).await {
                error!(
                    transaction_id = %transaction.id,
                    error = %abandon_err,
                    "Could not fail transaction after checkout error"
                );
            }
            Err(e.into())
        }
    }
}

/// Loads a gateway payment of `kind` owned by the caller.
pub(crate) async fn owned_payment(
    state: &AppState,
    auth: &AuthUser,
    reference: &str,
    kind: TransactionType,
) -> Result<transactions::Model, ApiError> {
    TransactionRepository::new((*state.db).clone())
        .find_by_reference(reference.trim())
        .await?
        .filter(|t| t.user_id == auth.user_id() && t.transaction_type == kind)
        .ok_or_else(|| ApiError::not_found("Payment not found"))
}

/// Loads the signed-in user.
pub(crate) async fn current_user(
    state: &AppState,
    auth: &AuthUser,
) -> Result<users::Model, ApiError> {
    UserRepository::new((*state.db).clone())
        .find_by_id(auth.user_id())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

fn payment_failed(reason: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "payment_failed", reason)
}

async fn ensure_owner(state: &AppState, auth: &AuthUser, reference: &str) -> Result<(), ApiError> {
    TransactionRepository::new((*state.db).clone())
        .find_by_reference(reference)
        .await?
        .filter(|t| t.user_id == auth.user_id())
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Payment not found"))
}

/// The user's wallet currency, checked against the one requested.
fn wallet_currency(user: &users::Model, requested: Option<&str>) -> Result<Currency, ApiError> {
    let wallet = user
        .currency
        .parse::<Currency>()
        .map_err(|e| ApiError::internal("Stored wallet currency is unknown", e))?;

    match non_empty(requested) {
        None => Ok(wallet),
        Some(code) => {
            let requested = code.parse::<Currency>().map_err(ApiError::validation)?;
            if requested == wallet {
                Ok(wallet)
            } else {
                Err(ApiError::validation(format!(
                    "Your wallet holds {wallet}, not {requested}"
                )))
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn user(currency: &str) -> users::Model {
        let now = Utc::now().into();
        users::Model {
            id: Uuid::now_v7(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            role: cambio_db::entities::sea_orm_active_enums::UserRole::User,
            is_active: true,
            wallet_balance: dec!(1000),
            currency: currency.into(),
            referral_code: "ADA12345".into(),
            referred_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_wallet_currency_defaults_to_wallet() {
        assert_eq!(wallet_currency(&user("NGN"), None).unwrap(), Currency::Ngn);
        assert_eq!(wallet_currency(&user("NGN"), Some(" ")).unwrap(), Currency::Ngn);
        assert_eq!(wallet_currency(&user("NGN"), Some("ngn")).unwrap(), Currency::Ngn);
    }

    #[test]
    fn test_wallet_currency_rejects_other_currency() {
        let err = wallet_currency(&user("NGN"), Some("USD")).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = wallet_currency(&user("NGN"), Some("XYZ")).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_transaction_query_builds_filter() {
        let owner = Uuid::now_v7();
        let query = TransactionQuery {
            limit: Some(500),
            status: Some("pending".into()),
            kind: Some("deposit".into()),
            date_filter: Some("week".into()),
            user_id: Some(Uuid::now_v7()),
            ..TransactionQuery::default()
        };

        let (filter, page) = query.into_filter(Some(owner)).unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(filter.user_id, Some(owner));
        assert_eq!(filter.status, Some(CoreStatus::Pending));
        assert_eq!(filter.kind, Some(CoreType::Deposit));
        assert!(filter.from.is_some());
    }

    #[test]
    fn test_transaction_query_rejects_unknown_status() {
        let query = TransactionQuery {
            status: Some("settled".into()),
            ..TransactionQuery::default()
        };
        let err = query.into_filter(None).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }
}
