//! Currency exchange routes and the live rate feed.

use std::{convert::Infallible, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::{self, Stream, StreamExt};
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use cambio_core::exchange::{ExchangeError, ExchangeRate, ExchangeService};
use cambio_core::transaction::{TransactionLifecycle, TransactionType as CoreType};
use cambio_core::wallet::WalletOperation;
use cambio_db::repositories::{
    ExchangeRateRepository, NewTransaction, TransactionRepository, WalletRepository,
    exchange_rate::to_domain,
};
use cambio_shared::types::Currency;

use super::payments::current_user;
use crate::{AppState, dto::TransactionView, error::ApiError, middleware::AuthUser};

/// Interval of SSE keep-alive comments.
const KEEP_ALIVE_SECS: u64 = 15;

/// Creates public exchange routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exchange/rates", get(list_rates))
        .route("/exchange/rates/stream", get(stream_rates))
}

/// Creates exchange routes that need a signed-in user.
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/exchange", post(create_exchange))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest {
    amount: Decimal,
    target_currency: String,
}

/// GET /exchange/rates - Current exchange rates.
async fn list_rates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut rates = state.rates.list();
    if rates.is_empty() {
        rates = reload_rates(&state).await?;
    }
    Ok(Json(json!({ "rates": rates })))
}

/// GET /exchange/rates/stream - Server-Sent Events of rate updates.
///
/// Sends the current rates as one `snapshot` event, then a `rate` event per
/// update.
async fn stream_rates(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let updates = state.rates.subscribe();
    let snapshot = state.rates.list();

    let first = stream::once(async move { Ok(json_event("snapshot", &snapshot)) });
    let rest = stream::unfold(updates, |mut updates| async move {
        loop {
            match updates.recv().await {
                Ok(rate) => return Some((Ok(json_event("rate", &rate)), updates)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Rate stream subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(first.chain(rest)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("ping"),
    )
}

/// POST /exchange - Convert part of the wallet into another currency.
///
/// The debit and the pending exchange record commit together; payout of the
/// converted amount is settled by an administrator.
async fn create_exchange(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ExchangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&state, &auth).await?;
    let source = user
        .currency
        .parse::<Currency>()
        .map_err(|e| ApiError::internal("Stored wallet currency is unknown", e))?;
    let target = payload
        .target_currency
        .parse::<Currency>()
        .map_err(ApiError::validation)?;

    if source == target {
        return Err(ExchangeError::SameCurrency(source).into());
    }

    let rate = resolve_rate(&state, source, target).await?;
    let quote = ExchangeService::quote(
        source,
        target,
        payload.amount,
        rate.rate,
        state.payments.exchange_fee_percent,
    )?;

    let txn = state.db.begin().await?;
    let balance = WalletRepository::apply_in(
        &txn,
        user.id,
        WalletOperation::Exchange {
            amount: quote.amount,
            fee: quote.fee,
        },
    )
    .await?;
    let transaction = TransactionRepository::create_pending_in(
        &txn,
        NewTransaction::new(user.id, CoreType::Exchange, quote.amount, source.code())
            .with_fees(quote.fee)
            .with_exchange(target.code(), quote.rate)
            .with_reference(TransactionLifecycle::generate_reference(CoreType::Exchange))
            .with_metadata(json!({ "converted_amount": quote.converted_amount })),
    )
    .await?;
    txn.commit().await?;

    info!(
        user_id = %user.id,
        transaction_id = %transaction.id,
        %source,
        %target,
        amount = %quote.amount,
        converted = %quote.converted_amount,
        "Exchange requested"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "quote": quote,
            "walletBalance": balance,
            "transaction": TransactionView::from(transaction)
        })),
    ))
}

/// Rate for a pair, from the cache or, once expired, from the database.
async fn resolve_rate(
    state: &AppState,
    base: Currency,
    quote: Currency,
) -> Result<ExchangeRate, ApiError> {
    if let Some(rate) = state.rates.get(base, quote).await {
        return Ok(rate);
    }

    let repo = ExchangeRateRepository::new((*state.db).clone());
    let stored = match repo.find_pair(base, quote).await? {
        Some(row) => Some(row),
        None => repo.find_pair(quote, base).await?,
    };

    let Some(rate) = stored.as_ref().and_then(to_domain) else {
        return Err(ExchangeError::RateUnavailable { base, quote }.into());
    };
    state.rates.insert(rate.clone()).await;

    if rate.base_currency == base {
        Ok(rate)
    } else {
        rate.inverse()
            .ok_or_else(|| ExchangeError::RateUnavailable { base, quote }.into())
    }
}

/// Refills the cache from the database.
async fn reload_rates(state: &AppState) -> Result<Vec<ExchangeRate>, ApiError> {
    let rows = ExchangeRateRepository::new((*state.db).clone())
        .list_all()
        .await?;
    for rate in rows.iter().filter_map(to_domain) {
        state.rates.insert(rate).await;
    }
    Ok(state.rates.list())
}

fn json_event<T: serde::Serialize>(name: &str, data: &T) -> Event {
    Event::default()
        .event(name)
        .data(serde_json::to_string(data).unwrap_or_else(|_| "null".to_string()))
}
