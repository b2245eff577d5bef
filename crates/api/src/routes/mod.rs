//! API route definitions.

use axum::{Router, middleware};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};

use crate::{AppState, error::ApiError, middleware::auth::auth_middleware};

pub mod admin;
pub mod auth;
pub mod coupons;
pub mod exchange;
pub mod health;
pub mod payments;
pub mod plans;
pub mod referrals;
pub mod webhooks;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Protected routes that require authentication
    let protected_routes = Router::new()
        .merge(auth::protected_routes())
        .merge(payments::routes())
        .merge(exchange::protected_routes())
        .merge(coupons::routes())
        .merge(plans::protected_routes())
        .merge(referrals::routes())
        .merge(admin::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Combine public and protected routes
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(plans::routes())
        .merge(exchange::routes())
        .merge(webhooks::routes())
        .merge(protected_routes)
}

/// Treats an empty query value (`?status=`) as absent.
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Parses a snake_case query value into one of the domain enums.
pub(crate) fn parse_param<T: DeserializeOwned>(
    name: &str,
    value: Option<&str>,
) -> Result<Option<T>, ApiError> {
    value
        .map(|v| {
            serde_json::from_value(serde_json::Value::String(v.trim().to_lowercase()))
                .map_err(|_| ApiError::validation(format!("Unknown {name} '{v}'")))
        })
        .transpose()
}
