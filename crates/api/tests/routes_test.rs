//! Router tests that run without a database.
//!
//! Everything here is decided before storage is touched: authentication,
//! the policy guard, webhook signatures, and request validation.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use rstest::rstest;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use cambio_gateway::{SIGNATURE_HEADER, sign};
use common::{WEBHOOK_SECRET, access_token, offline_app, refresh_token, send};

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let app = offline_app();

    let (status, body) = send(&app, "GET", "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
    assert_eq!(body["activePolls"], 0);
}

#[tokio::test]
async fn test_request_id_is_generated_and_echoed() {
    let app = offline_app();

    let response = app
        .clone()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers().get("x-request-id").unwrap();
    assert!(Uuid::parse_str(generated.to_str().unwrap()).is_ok());

    let response = app
        .oneshot(
            Request::get("/api/health")
                .header("x-request-id", "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "trace-me");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = offline_app();

    let (status, body) = send(&app, "GET", "/api/auth/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_token");
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = offline_app();
    let token = refresh_token("user");

    let (status, body) = send(&app, "GET", "/api/payments/transactions", Some(&token), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = offline_app();
    let token = access_token("user");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": token })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = offline_app();

    let (status, body) = send(&app, "GET", "/api/referrals", Some("not-a-jwt"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[rstest]
#[case("user", "GET", "/api/admin/users".to_string(), None)]
#[case("support", "GET", "/api/admin/coupons".to_string(), None)]
#[case("moderator", "POST", "/api/admin/plans".to_string(), Some(json!({ "name": "Pro", "price": "100" })))]
#[case(
    "admin",
    "PATCH",
    format!("/api/admin/users/{}/role", Uuid::new_v4()),
    Some(json!({ "role": "manager" }))
)]
#[case(
    "support",
    "POST",
    format!("/api/admin/users/{}/wallet", Uuid::new_v4()),
    Some(json!({ "action": "add", "amount": "500" }))
)]
#[case(
    "user",
    "POST",
    format!("/api/admin/exchanges/{}/cancel", Uuid::new_v4()),
    None
)]
#[case(
    "support",
    "PUT",
    "/api/admin/exchange-rates".to_string(),
    Some(json!({ "baseCurrency": "USD", "quoteCurrency": "NGN", "rate": "1500" }))
)]
#[tokio::test]
async fn test_policy_denies_role(
    #[case] role: &str,
    #[case] method: &str,
    #[case] uri: String,
    #[case] body: Option<serde_json::Value>,
) {
    let app = offline_app();
    let token = access_token(role);

    let (status, response) = send(&app, method, &uri, Some(&token), body).await;

    assert_eq!(status, StatusCode::FORBIDDEN, "{role} {method} {uri}");
    assert_eq!(response["error"], "forbidden");
}

#[tokio::test]
async fn test_webhook_with_bad_signature_is_rejected() {
    let app = offline_app();
    let payload = json!({ "event": "charge.success", "data": { "reference": "DEP_1" } });

    let response = app
        .oneshot(
            Request::post("/api/webhooks/paystack")
                .header(SIGNATURE_HEADER, "deadbeef")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signed_interim_transfer_webhook_is_acknowledged() {
    let app = offline_app();
    let payload = json!({ "event": "transfer.otp", "data": { "reference": "WDR_1" } }).to_string();
    let signature = sign(WEBHOOK_SECRET, payload.as_bytes()).unwrap();

    let response = app
        .oneshot(
            Request::post("/api/webhooks/paystack")
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_validates_before_storage() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": "ada",
            "email": "not-an-email",
            "password": "correct horse battery"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_register_rejects_unknown_currency() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": "grace",
            "email": "grace@example.com",
            "password": "correct horse battery",
            "currency": "XYZ"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_admin_list_rejects_unknown_role_filter() {
    let app = offline_app();
    let token = access_token("admin");

    let (status, body) =
        send(&app, "GET", "/api/admin/users?role=emperor", Some(&token), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}
