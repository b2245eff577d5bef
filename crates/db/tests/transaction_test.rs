//! Integration tests for the transaction repository.
//!
//! Finalization is a conditional status flip, so duplicate confirmations
//! apply their wallet effect at most once.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::TransactionTrait;
use serde_json::json;
use tokio::sync::Barrier;

use cambio_core::transaction::{
    Outcome, TransactionError, TransactionFilter, TransactionLifecycle, TransactionStatus,
    TransactionType,
};
use cambio_core::wallet::WalletOperation;
use cambio_db::entities::sea_orm_active_enums::TransactionStatus as DbStatus;
use cambio_db::repositories::{
    NewTransaction, TransactionRepoError, TransactionRepository, WalletRepository,
};
use cambio_shared::types::PageRequest;

fn deposit(user_id: uuid::Uuid, amount: rust_decimal::Decimal) -> NewTransaction {
    NewTransaction::new(user_id, TransactionType::Deposit, amount, "ngn")
        .with_reference(TransactionLifecycle::generate_reference(TransactionType::Deposit))
        .with_metadata(json!({ "gateway": "paystack" }))
}

#[tokio::test]
async fn test_create_pending_normalises_and_stores() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());

    let tx = repo.create_pending(deposit(user.id, dec!(5000))).await.unwrap();

    assert_eq!(tx.status, DbStatus::Pending);
    assert_eq!(tx.currency, "NGN");
    assert!(tx.processed_at.is_none());
    assert_eq!(tx.metadata["gateway"], "paystack");

    let found = repo
        .find_by_reference(tx.reference.as_deref().unwrap())
        .await
        .unwrap()
        .expect("transaction should exist");
    assert_eq!(found.id, tx.id);
}

#[tokio::test]
async fn test_create_pending_rejects_non_positive_amount() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());

    let result = repo.create_pending(deposit(user.id, dec!(0))).await;

    assert!(matches!(
        result,
        Err(TransactionRepoError::Transaction(TransactionError::InvalidAmount(_)))
    ));
}

#[tokio::test]
async fn test_create_pending_rejects_sub_kobo_amount_and_fee() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());

    let amount = repo.create_pending(deposit(user.id, dec!(0.005))).await;
    assert!(matches!(
        amount,
        Err(TransactionRepoError::Transaction(TransactionError::TooPrecise(_)))
    ));

    let fee = repo
        .create_pending(deposit(user.id, dec!(100)).with_fees(dec!(0.125)))
        .await;
    assert!(matches!(
        fee,
        Err(TransactionRepoError::Transaction(TransactionError::TooPrecise(_)))
    ));
}

#[tokio::test]
async fn test_finalize_merges_metadata_and_sets_processed_at() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());
    let tx = repo.create_pending(deposit(user.id, dec!(100))).await.unwrap();

    let done = repo
        .finalize(
            tx.id,
            Outcome::Failed,
            json!({ "failure_reason": "Declined", "gateway": "paystack-v2" }),
        )
        .await
        .unwrap();

    assert_eq!(done.status, DbStatus::Failed);
    assert!(done.processed_at.is_some());
    assert_eq!(done.metadata["failure_reason"], "Declined");
    assert_eq!(done.metadata["gateway"], "paystack-v2");
}

#[tokio::test]
async fn test_finalize_twice_reports_invalid_state() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());
    let tx = repo.create_pending(deposit(user.id, dec!(100))).await.unwrap();

    repo.finalize(tx.id, Outcome::Completed, json!({}))
        .await
        .unwrap();
    let second = repo.finalize(tx.id, Outcome::Failed, json!({})).await;

    match second {
        Err(err @ TransactionRepoError::Transaction(TransactionError::InvalidState { from, to })) => {
            assert!(err.is_already_final());
            assert_eq!(from, TransactionStatus::Completed);
            assert_eq!(to, TransactionStatus::Failed);
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }

    let stored = repo.find_by_id(tx.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DbStatus::Completed);
}

#[tokio::test]
async fn test_concurrent_settlement_credits_once() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let tx = TransactionRepository::new(db.clone())
        .create_pending(deposit(user.id, dec!(5000)))
        .await
        .unwrap();

    const CALLERS: usize = 10;
    let barrier = Arc::new(Barrier::new(CALLERS));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            let (tx_id, user_id) = (tx.id, user.id);
            tokio::spawn(async move {
                barrier.wait().await;
                let txn = db.begin().await.unwrap();
                match TransactionRepository::finalize_in(&txn, tx_id, Outcome::Completed, json!({}))
                    .await
                {
                    Ok(_) => {
                        WalletRepository::apply_in(&txn, user_id, WalletOperation::Deposit(dec!(5000)))
                            .await
                            .unwrap();
                        txn.commit().await.unwrap();
                        true
                    }
                    Err(err) => {
                        assert!(err.is_already_final(), "unexpected error: {err}");
                        txn.rollback().await.unwrap();
                        false
                    }
                }
            })
        })
        .collect();

    let winners = join_all(handles)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().expect("task panicked"))
        .count();

    assert_eq!(winners, 1);
    let balance = WalletRepository::new(db.clone()).balance(user.id).await.unwrap();
    assert_eq!(balance, dec!(5000));
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());

    for amount in [dec!(10), dec!(20), dec!(30)] {
        repo.create_pending(deposit(user.id, amount)).await.unwrap();
    }
    let marked = repo
        .create_pending(
            NewTransaction::new(user.id, TransactionType::Withdrawal, dec!(40), "NGN")
                .with_metadata(json!({ "bank": { "account_name": "Ada Obi" } })),
        )
        .await
        .unwrap();

    let filter = TransactionFilter {
        user_id: Some(user.id),
        ..TransactionFilter::default()
    };
    let page = repo
        .list(&filter, PageRequest::from_query(Some(2), Some(0)))
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
    assert!(page.has_more());

    let deposits = TransactionFilter {
        kind: Some(TransactionType::Deposit),
        ..filter.clone()
    };
    let page = repo.list(&deposits, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 3);

    let search = TransactionFilter {
        search: Some("ada obi".to_string()),
        ..filter.clone()
    };
    let page = repo.list(&search, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, marked.id);

    let future = TransactionFilter {
        from: Some(Utc::now() + Duration::hours(1)),
        ..filter
    };
    let page = repo.list(&future, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_stale_pending_lists_only_old_gateway_payments() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());
    let pending = repo.create_pending(deposit(user.id, dec!(75))).await.unwrap();
    let settled = repo.create_pending(deposit(user.id, dec!(80))).await.unwrap();
    repo.finalize(settled.id, Outcome::Completed, json!({}))
        .await
        .unwrap();

    let stale = repo
        .list_stale_pending(Utc::now() + Duration::seconds(1), 1000)
        .await
        .unwrap();
    assert!(stale.iter().any(|t| t.id == pending.id));
    assert!(stale.iter().all(|t| t.id != settled.id));

    let none = repo
        .list_stale_pending(Utc::now() - Duration::hours(1), 1000)
        .await
        .unwrap();
    assert!(none.iter().all(|t| t.id != pending.id));
}
