//! End-to-end payment flows against PostgreSQL and a stub gateway.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::StatusCode};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use uuid::Uuid;

use cambio_api::{Settlement, create_router};
use cambio_core::coupon::CouponType;
use cambio_core::gateway::TransferStatus;
use cambio_core::poller::{Verification, Verifier};
use cambio_core::subscription::PlanStatus;
use cambio_core::transaction::{TransactionLifecycle, TransactionType};
use cambio_db::entities::sea_orm_active_enums::TransactionStatus;
use cambio_db::repositories::{
    CouponRepository, CreateCouponInput, CreatePlanInput, NewTransaction, PlanRepository,
    TransactionRepository,
};
use common::{Payout, StubGateway, deliver_webhook, fund, register, send, setup_db, state_with};

fn withdrawal(amount: &str) -> Value {
    json!({
        "amount": amount,
        "currency": "NGN",
        "accountNumber": "0123456789",
        "bankCode": "058",
        "accountName": "Ada Lovelace"
    })
}

async fn balance(app: &Router, token: &str) -> Value {
    let (_, me) = send(app, "GET", "/api/auth/me", Some(token), None).await;
    me["walletBalance"].clone()
}

/// Polls the confirmation endpoint until the poll leaves `waiting`.
async fn finished_poll(app: &Router, token: &str, reference: &str) -> Value {
    let uri = format!("/api/payments/confirmations/{reference}");
    for _ in 0..100 {
        let (status, snapshot) = send(app, "GET", &uri, Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        if snapshot["state"] != "waiting" && snapshot["state"] != "idle" {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("poll for {reference} never finished");
}

#[tokio::test]
async fn test_deposit_credits_wallet_once() {
    let Some(db) = setup_db().await else {
        return;
    };
    let app = create_router(state_with(db, Arc::new(StubGateway::instant())));
    let token = register(&app).await;

    let (status, checkout) = send(
        &app,
        "POST",
        "/api/payments/deposit/initialize",
        Some(&token),
        Some(json!({ "amount": "5000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{checkout}");
    let reference = checkout["reference"].as_str().unwrap().to_string();
    assert!(checkout["authorizationUrl"].as_str().unwrap().ends_with(&reference));

    let (status, verified) = send(
        &app,
        "POST",
        "/api/payments/deposit/verify",
        Some(&token),
        Some(json!({ "reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{verified}");
    assert_eq!(verified["status"], "completed");
    assert_eq!(verified["walletBalance"], "5000.00");

    // A second confirmation changes nothing.
    let (status, again) = send(
        &app,
        "POST",
        "/api/payments/deposit/verify",
        Some(&token),
        Some(json!({ "reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["walletBalance"], "5000.00");

    let (status, history) =
        send(&app, "GET", "/api/payments/transactions?type=deposit", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    assert_eq!(history["transactions"][0]["status"], "completed");
}

#[tokio::test]
async fn test_pending_deposit_is_confirmed_by_background_poll() {
    let Some(db) = setup_db().await else {
        return;
    };
    // The verify call and the first two poll attempts see `pending`.
    let gateway = Arc::new(StubGateway::pending_for(3));
    let app = create_router(state_with(db, gateway.clone()));
    let token = register(&app).await;

    let (_, checkout) = send(
        &app,
        "POST",
        "/api/payments/deposit/initialize",
        Some(&token),
        Some(json!({ "amount": "1200.50" })),
    )
    .await;
    let reference = checkout["reference"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/deposit/verify",
        Some(&token),
        Some(json!({ "reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");

    let uri = format!("/api/payments/confirmations/{reference}");
    let mut last = serde_json::Value::Null;
    for _ in 0..100 {
        let (status, snapshot) = send(&app, "GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        if snapshot["state"] == "success" {
            last = snapshot;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(last["state"], "success", "poll never finished");
    assert_eq!(last["attempts"], 3);
    assert_eq!(gateway.verify_calls(), 4);

    let (_, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(me["walletBalance"], "1200.50");
}

#[tokio::test]
async fn test_transfer_moves_money_between_users() {
    let Some(db) = setup_db().await else {
        return;
    };
    let app = create_router(state_with(db, Arc::new(StubGateway::instant())));
    let sender = register(&app).await;
    let recipient = register(&app).await;

    let (_, recipient_me) = send(&app, "GET", "/api/auth/me", Some(&recipient), None).await;
    let recipient_name = recipient_me["username"].as_str().unwrap().to_string();

    let (_, checkout) = send(
        &app,
        "POST",
        "/api/payments/deposit/initialize",
        Some(&sender),
        Some(json!({ "amount": "1000" })),
    )
    .await;
    send(
        &app,
        "POST",
        "/api/payments/deposit/verify",
        Some(&sender),
        Some(json!({ "reference": checkout["reference"] })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/transfer",
        Some(&sender),
        Some(json!({ "recipientUsername": recipient_name, "amount": "400" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, sender_me) = send(&app, "GET", "/api/auth/me", Some(&sender), None).await;
    let (_, recipient_me) = send(&app, "GET", "/api/auth/me", Some(&recipient), None).await;
    assert_eq!(sender_me["walletBalance"], "600.00");
    assert_eq!(recipient_me["walletBalance"], "400.00");

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/transfer",
        Some(&sender),
        Some(json!({ "recipientUsername": recipient_name, "amount": "10000" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], "insufficient_funds");
}

#[tokio::test]
async fn test_sub_kobo_transfer_is_rejected() {
    let Some(db) = setup_db().await else {
        return;
    };
    let app = create_router(state_with(db, Arc::new(StubGateway::instant())));
    let sender = register(&app).await;
    let recipient = register(&app).await;
    let (_, recipient_me) = send(&app, "GET", "/api/auth/me", Some(&recipient), None).await;
    fund(&app, &sender, "10").await;

    for amount in ["0.005", "0.001", "9.999"] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/payments/transfer",
            Some(&sender),
            Some(json!({ "recipientId": recipient_me["id"], "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["error"], "validation_error");
    }

    assert_eq!(balance(&app, &sender).await, "10.00");
    assert_eq!(balance(&app, &recipient).await, "0.00");
}

#[tokio::test]
async fn test_withdraw_more_than_balance_is_refused() {
    let Some(db) = setup_db().await else {
        return;
    };
    let gateway = Arc::new(StubGateway::instant());
    let app = create_router(state_with(db, gateway.clone()));
    let token = register(&app).await;
    fund(&app, &token, "1000").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/withdraw",
        Some(&token),
        Some(withdrawal("1500")),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], "insufficient_funds");
    assert_eq!(balance(&app, &token).await, "1000.00");
    assert_eq!(gateway.transfer_calls(), 0);

    let (_, history) = send(
        &app,
        "GET",
        "/api/payments/transactions?type=withdrawal",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn test_accepted_payout_completes_withdrawal() {
    let Some(db) = setup_db().await else {
        return;
    };
    let gateway = StubGateway::instant().with_payout(Payout::Accepted(TransferStatus::Success));
    let app = create_router(state_with(db, Arc::new(gateway)));
    let token = register(&app).await;
    fund(&app, &token, "1000").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/withdraw",
        Some(&token),
        Some(withdrawal("400")),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["walletBalance"], "600.00");
    assert_eq!(body["transaction"]["status"], "completed");
    let reference = body["transaction"]["reference"].as_str().unwrap().to_string();
    assert!(
        body["transaction"]["metadata"]["transfer_reference"]
            .as_str()
            .unwrap()
            .ends_with(&reference)
    );

    // A late failure event cannot refund a completed payout.
    let event = json!({ "event": "transfer.failed", "data": { "reference": reference } });
    assert_eq!(deliver_webhook(&app, &event).await, StatusCode::OK);
    assert_eq!(balance(&app, &token).await, "600.00");
}

#[tokio::test]
async fn test_rejected_payout_is_refunded() {
    let Some(db) = setup_db().await else {
        return;
    };
    let gateway = StubGateway::instant()
        .with_payout(Payout::Rejected("Invalid account number".to_string()));
    let app = create_router(state_with(db, Arc::new(gateway)));
    let token = register(&app).await;
    fund(&app, &token, "1000").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/withdraw",
        Some(&token),
        Some(withdrawal("400")),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], "gateway_rejected");
    assert_eq!(balance(&app, &token).await, "1000.00");

    let (_, history) = send(
        &app,
        "GET",
        "/api/payments/transactions?type=withdrawal",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(history["total"], 1);
    let failed = &history["transactions"][0];
    assert_eq!(failed["status"], "failed");
    assert!(
        failed["metadata"]["failure_reason"]
            .as_str()
            .unwrap()
            .contains("Invalid account number")
    );

    // Redelivered failure events refund nothing more.
    let event = json!({ "event": "transfer.failed", "data": { "reference": failed["reference"] } });
    assert_eq!(deliver_webhook(&app, &event).await, StatusCode::OK);
    assert_eq!(balance(&app, &token).await, "1000.00");
}

#[tokio::test]
async fn test_declined_payout_status_is_refunded() {
    let Some(db) = setup_db().await else {
        return;
    };
    let gateway = StubGateway::instant().with_payout(Payout::Accepted(TransferStatus::Failed));
    let app = create_router(state_with(db, Arc::new(gateway)));
    let token = register(&app).await;
    fund(&app, &token, "500").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/withdraw",
        Some(&token),
        Some(withdrawal("500")),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(balance(&app, &token).await, "500.00");
}

#[tokio::test]
async fn test_unreachable_payout_stays_pending_until_failure_event() {
    let Some(db) = setup_db().await else {
        return;
    };
    let gateway = StubGateway::instant().with_payout(Payout::Unreachable);
    let app = create_router(state_with(db, Arc::new(gateway)));
    let token = register(&app).await;
    fund(&app, &token, "1000").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/withdraw",
        Some(&token),
        Some(withdrawal("400")),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["walletBalance"], "600.00");
    assert_eq!(body["transaction"]["status"], "pending");
    assert_eq!(body["transaction"]["metadata"]["payout_error"], "Paystack timed out");
    let reference = body["transaction"]["reference"].clone();

    let event = json!({
        "event": "transfer.reversed",
        "data": { "reference": reference, "reason": "Beneficiary bank unavailable" }
    });
    assert_eq!(deliver_webhook(&app, &event).await, StatusCode::OK);
    assert_eq!(balance(&app, &token).await, "1000.00");

    // Redelivery is harmless.
    assert_eq!(deliver_webhook(&app, &event).await, StatusCode::OK);
    assert_eq!(balance(&app, &token).await, "1000.00");

    let (_, history) = send(
        &app,
        "GET",
        "/api/payments/transactions?type=withdrawal",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(history["transactions"][0]["status"], "failed");
    assert_eq!(
        history["transactions"][0]["metadata"]["failure_reason"],
        "Beneficiary bank unavailable"
    );
}

#[tokio::test]
async fn test_unreachable_payout_completed_by_success_event() {
    let Some(db) = setup_db().await else {
        return;
    };
    let gateway = StubGateway::instant().with_payout(Payout::Unreachable);
    let app = create_router(state_with(db, Arc::new(gateway)));
    let token = register(&app).await;
    fund(&app, &token, "1000").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/payments/withdraw",
        Some(&token),
        Some(withdrawal("250")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");

    let event = json!({
        "event": "transfer.success",
        "data": { "reference": body["transaction"]["reference"] }
    });
    assert_eq!(deliver_webhook(&app, &event).await, StatusCode::OK);

    assert_eq!(balance(&app, &token).await, "750.00");
    let (_, history) = send(
        &app,
        "GET",
        "/api/payments/transactions?type=withdrawal",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(history["transactions"][0]["status"], "completed");
}

#[tokio::test]
async fn test_verification_4xx_is_retried_by_poll() {
    let Some(db) = setup_db().await else {
        return;
    };
    // The verify call sees `pending`, the first two poll attempts get a 4xx.
    let gateway = Arc::new(StubGateway::pending_for(1).rejecting(2));
    let app = create_router(state_with(db, gateway.clone()));
    let token = register(&app).await;

    let (_, checkout) = send(
        &app,
        "POST",
        "/api/payments/deposit/initialize",
        Some(&token),
        Some(json!({ "amount": "750" })),
    )
    .await;
    let reference = checkout["reference"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        "/api/payments/deposit/verify",
        Some(&token),
        Some(json!({ "reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let snapshot = finished_poll(&app, &token, &reference).await;
    assert_eq!(snapshot["state"], "success", "{snapshot}");
    assert_eq!(snapshot["attempts"], 3);
    assert_eq!(gateway.verify_calls(), 4);
    assert_eq!(balance(&app, &token).await, "750.00");
}

#[tokio::test]
async fn test_rejected_verification_leaves_payment_pending() {
    let Some(db) = setup_db().await else {
        return;
    };
    let app = create_router(state_with(db.clone(), Arc::new(StubGateway::instant())));
    let token = register(&app).await;
    let (_, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    let user_id: Uuid = serde_json::from_value(me["id"].clone()).unwrap();

    // Never initialized with the stub, so every verification is a 4xx.
    let reference = TransactionLifecycle::generate_reference(TransactionType::Deposit);
    let repo = TransactionRepository::new(db.clone());
    let pending = repo
        .create_pending(
            NewTransaction::new(user_id, TransactionType::Deposit, dec!(300), "NGN")
                .with_reference(reference.clone()),
        )
        .await
        .unwrap();

    let settlement = Settlement::new(db, Arc::new(StubGateway::instant()));
    assert!(matches!(
        settlement.verify(&reference).await,
        Verification::Retry(_)
    ));

    let row = repo.find_by_id(pending.id).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_gateway_subscription_with_coupon() {
    let Some(db) = setup_db().await else {
        return;
    };
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    let plan = PlanRepository::new(db.clone())
        .create(CreatePlanInput {
            name: format!("Pro {suffix}"),
            description: Some("Lower exchange fees".to_string()),
            price: dec!(5000),
            currency: "NGN".to_string(),
            features: vec!["Priority support".to_string()],
            status: PlanStatus::Active,
            referral_commission_rate: dec!(10),
            duration_days: 30,
        })
        .await
        .unwrap();
    let coupons = CouponRepository::new(db.clone());
    let coupon = coupons
        .create(CreateCouponInput {
            code: format!("WELCOME10{suffix}"),
            kind: CouponType::Percentage,
            value: dec!(10),
            max_redemptions: Some(100),
            min_purchase_amount: Some(dec!(1000)),
            starts_at: None,
            ends_at: None,
            is_stackable: false,
        })
        .await
        .unwrap();

    let gateway = Arc::new(StubGateway::instant());
    let app = create_router(state_with(db, gateway));
    let token = register(&app).await;

    let (status, checkout) = send(
        &app,
        "POST",
        "/api/plans/subscribe/payment",
        Some(&token),
        Some(json!({ "planId": plan.id, "couponCode": coupon.code.to_lowercase() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{checkout}");
    let reference = checkout["reference"].as_str().unwrap().to_string();

    // The use is reserved as soon as the payment is opened.
    let reserved = coupons.find_by_code(&coupon.code).await.unwrap().unwrap();
    assert_eq!(reserved.usage_count, 1);

    let (status, body) = send(
        &app,
        "POST",
        "/api/plans/subscribe/verify",
        Some(&token),
        Some(json!({ "reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["subscription"]["plan"]["id"], json!(plan.id));

    // Verifying again neither redeems twice nor changes the plan.
    let (status, _) = send(
        &app,
        "POST",
        "/api/plans/subscribe/verify",
        Some(&token),
        Some(json!({ "reference": reference })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let used = coupons.find_by_code(&coupon.code).await.unwrap().unwrap();
    assert_eq!(used.usage_count, 1);

    let (_, history) = send(
        &app,
        "GET",
        "/api/payments/transactions?type=subscription",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["transactions"][0]["amount"], "4500.00");
    assert_eq!(history["transactions"][0]["status"], "completed");

    let (_, current) = send(&app, "GET", "/api/plans/subscription", Some(&token), None).await;
    assert_eq!(current["subscription"]["status"], "active");
}
