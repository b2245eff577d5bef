//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes under `/api`
//! - Authentication middleware and the policy guard
//! - Settlement of gateway payments and the reconciliation job
//! - The `{error, message}` error envelope

mod dto;
pub mod error;
pub mod middleware;
pub mod reconciler;
pub mod routes;
pub mod settlement;

use std::sync::Arc;

use axum::{Router, http::HeaderName};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use cambio_core::exchange::RateCache;
use cambio_core::gateway::PaymentGateway;
use cambio_core::poller::PollRegistry;
use cambio_shared::JwtService;

pub use error::ApiError;
pub use settlement::Settlement;

/// Payment settings read by handlers.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// Key used to verify gateway webhook signatures.
    pub webhook_secret: String,
    /// Percent fee charged on currency exchanges.
    pub exchange_fee_percent: Decimal,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token operations.
    pub jwt_service: Arc<JwtService>,
    /// Payment gateway.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Cached exchange rates and their update feed.
    pub rates: RateCache,
    /// Server-side confirmation polls.
    pub polls: Arc<PollRegistry>,
    /// Payment settings.
    pub payments: Arc<PaymentSettings>,
}

impl AppState {
    /// Settlement bound to this state's database and gateway.
    #[must_use]
    pub fn settlement(&self) -> Settlement {
        Settlement::new((*self.db).clone(), Arc::clone(&self.gateway))
    }
}

/// Header carrying the per-request id.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Creates the main application router.
///
/// Every request gets an `x-request-id` (kept if the caller sent one), which
/// is echoed on the response and recorded on the request span.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/api", routes::api_routes_with_state(state.clone()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
