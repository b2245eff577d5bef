//! Integration tests for plan activation, cancellation, and referrals.

mod common;

use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, TransactionTrait};
use uuid::Uuid;

use cambio_core::subscription::{PlanStatus, SubscriptionError, referral_commission};
use cambio_core::transaction::{Outcome, TransactionLifecycle, TransactionType};
use cambio_core::wallet::WalletOperation;
use cambio_db::entities::{
    plans,
    sea_orm_active_enums::{ReferralStatus, UserPlanStatus},
    user_plans,
};
use cambio_db::repositories::{
    CreatePlanInput, NewTransaction, PlanRepoError, PlanRepository, ReferralRepository,
    TransactionRepository, WalletRepository, referral::total_earned,
};

async fn create_plan(repo: &PlanRepository, price: rust_decimal::Decimal) -> plans::Model {
    repo.create(CreatePlanInput {
        name: format!("Pro {}", Uuid::new_v4()),
        description: Some("Priority exchange".to_string()),
        price,
        currency: "ngn".to_string(),
        features: vec!["Priority support".to_string(), "Lower fees".to_string()],
        status: PlanStatus::Active,
        referral_commission_rate: dec!(10),
        duration_days: 30,
    })
    .await
    .expect("Failed to create plan")
}

#[tokio::test]
async fn test_activation_expires_previous_plan() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = PlanRepository::new(db.clone());
    let basic = create_plan(&repo, dec!(1000)).await;
    let pro = create_plan(&repo, dec!(5000)).await;
    assert_eq!(pro.currency, "NGN");
    assert_eq!(pro.feature_list(), vec!["Priority support", "Lower fees"]);

    let first = PlanRepository::activate_in(&db, user.id, &basic, None)
        .await
        .unwrap();
    let second = PlanRepository::activate_in(&db, user.id, &pro, None)
        .await
        .unwrap();

    let (current, plan) = repo
        .find_active_for_user(user.id)
        .await
        .unwrap()
        .expect("user should have an active plan");
    assert_eq!(current.id, second.id);
    assert_eq!(plan.id, pro.id);
    assert_eq!((current.expires_at - current.started_at).num_days(), 30);

    let previous = user_plans::Entity::find_by_id(first.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(previous.status, UserPlanStatus::Expired);
}

#[tokio::test]
async fn test_pending_subscription_activates_on_payment() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = PlanRepository::new(db.clone());
    let plan = create_plan(&repo, dec!(2500)).await;
    let tx = TransactionRepository::new(db.clone())
        .create_pending(
            NewTransaction::new(user.id, TransactionType::Subscription, dec!(2500), "NGN")
                .with_reference(TransactionLifecycle::generate_reference(
                    TransactionType::Subscription,
                )),
        )
        .await
        .unwrap();

    PlanRepository::create_pending_in(&db, user.id, &plan, tx.id)
        .await
        .unwrap();
    assert!(repo.find_active_for_user(user.id).await.unwrap().is_none());

    let (subscription, activated_plan) = PlanRepository::activate_pending_in(&db, tx.id)
        .await
        .unwrap()
        .expect("pending subscription should activate");
    assert_eq!(subscription.status, UserPlanStatus::Active);
    assert_eq!(subscription.transaction_id, Some(tx.id));
    assert_eq!(activated_plan.id, plan.id);

    let again = PlanRepository::activate_pending_in(&db, tx.id).await.unwrap();
    assert!(again.is_none());
}

#[tokio::test]
async fn test_failed_payment_cancels_pending_subscription() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = PlanRepository::new(db.clone());
    let plan = create_plan(&repo, dec!(2500)).await;
    let tx = TransactionRepository::new(db.clone())
        .create_pending(
            NewTransaction::new(user.id, TransactionType::Subscription, dec!(2500), "NGN")
                .with_reference(TransactionLifecycle::generate_reference(
                    TransactionType::Subscription,
                )),
        )
        .await
        .unwrap();
    PlanRepository::create_pending_in(&db, user.id, &plan, tx.id)
        .await
        .unwrap();

    let cancelled = PlanRepository::cancel_pending_in(&db, tx.id).await.unwrap();

    assert_eq!(cancelled, 1);
    assert!(
        PlanRepository::activate_pending_in(&db, tx.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_cancel_requires_active_subscription() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = PlanRepository::new(db.clone());

    let result = repo.cancel_active(user.id).await;
    assert!(matches!(
        result,
        Err(PlanRepoError::Subscription(SubscriptionError::NoActiveSubscription))
    ));

    let plan = create_plan(&repo, dec!(1000)).await;
    PlanRepository::activate_in(&db, user.id, &plan, None)
        .await
        .unwrap();
    let cancelled = repo.cancel_active(user.id).await.unwrap();
    assert_eq!(cancelled.status, UserPlanStatus::Cancelled);
    assert!(repo.find_active_for_user(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_referral_reward_is_paid_once() {
    let Some(db) = common::setup().await else {
        return;
    };
    let referrer = common::create_user(&db, dec!(0)).await;
    let referred = common::create_user(&db, dec!(0)).await;
    ReferralRepository::create_in(&db, referrer.id, referred.id)
        .await
        .unwrap();

    let plan = create_plan(&PlanRepository::new(db.clone()), dec!(5000)).await;
    let commission = referral_commission(dec!(5000), plan.referral_commission_rate);
    assert_eq!(commission, dec!(500));

    let txn = db.begin().await.unwrap();
    let referral = ReferralRepository::find_pending_for_referred_in(&txn, referred.id)
        .await
        .unwrap()
        .expect("referral should be pending");
    let credit = TransactionRepository::create_completed_in(
        &txn,
        NewTransaction::new(referrer.id, TransactionType::Referral, commission, "NGN"),
    )
    .await
    .unwrap();
    WalletRepository::apply_in(&txn, referrer.id, WalletOperation::ReferralCredit(commission))
        .await
        .unwrap();
    assert!(
        ReferralRepository::reward_in(&txn, referral.id, commission, credit.id)
            .await
            .unwrap()
    );
    txn.commit().await.unwrap();

    assert!(
        !ReferralRepository::reward_in(&db, referral.id, commission, credit.id)
            .await
            .unwrap()
    );
    assert!(
        ReferralRepository::find_pending_for_referred_in(&db, referred.id)
            .await
            .unwrap()
            .is_none()
    );

    let referrals = ReferralRepository::new(db.clone())
        .list_for_referrer(referrer.id)
        .await
        .unwrap();
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0].referred_username, referred.username);
    assert_eq!(referrals[0].referral.status, ReferralStatus::Rewarded);
    assert_eq!(total_earned(&referrals), dec!(500));

    let balance = WalletRepository::new(db.clone())
        .balance(referrer.id)
        .await
        .unwrap();
    assert_eq!(balance, dec!(500));
}

#[tokio::test]
async fn test_prior_paid_subscription_is_detected() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = TransactionRepository::new(db.clone());
    let first = repo
        .create_pending(NewTransaction::new(
            user.id,
            TransactionType::Subscription,
            dec!(1000),
            "NGN",
        ))
        .await
        .unwrap();
    repo.finalize(first.id, Outcome::Completed, serde_json::json!({}))
        .await
        .unwrap();
    let second = repo
        .create_pending(NewTransaction::new(
            user.id,
            TransactionType::Subscription,
            dec!(1000),
            "NGN",
        ))
        .await
        .unwrap();

    assert!(
        !TransactionRepository::has_completed_in(&db, user.id, TransactionType::Subscription, first.id)
            .await
            .unwrap()
    );
    assert!(
        TransactionRepository::has_completed_in(&db, user.id, TransactionType::Subscription, second.id)
            .await
            .unwrap()
    );
}
