//! Integration tests for User repository.

mod common;

use rust_decimal_macros::dec;

use cambio_core::auth::UserRole;
use cambio_db::entities::sea_orm_active_enums::UserRole as DbRole;
use cambio_db::repositories::{UserFilter, UserRepository};
use cambio_shared::types::PageRequest;

#[tokio::test]
async fn test_user_create_and_lookup_ignore_case() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = UserRepository::new(db.clone());

    assert_eq!(user.role, DbRole::User);
    assert!(user.is_active);
    assert_eq!(user.wallet_balance, dec!(0));

    let by_email = repo
        .find_by_identifier(&user.email.to_uppercase())
        .await
        .unwrap()
        .expect("email lookup should ignore case");
    assert_eq!(by_email.id, user.id);

    let by_username = repo
        .find_by_identifier(&format!(" {} ", user.username.to_uppercase()))
        .await
        .unwrap()
        .expect("username lookup should ignore case");
    assert_eq!(by_username.id, user.id);

    let by_code = repo
        .find_by_referral_code(&user.referral_code.to_lowercase())
        .await
        .unwrap()
        .expect("referral code lookup should normalise");
    assert_eq!(by_code.id, user.id);

    assert!(repo.email_exists(&user.email).await.unwrap());
    assert!(repo.username_exists(&user.username).await.unwrap());
}

#[tokio::test]
async fn test_set_active_and_role() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = UserRepository::new(db.clone());

    let disabled = repo.set_active(user.id, false).await.unwrap();
    assert!(!disabled.is_active);

    let promoted = repo.set_role(user.id, UserRole::Support).await.unwrap();
    assert_eq!(promoted.role, DbRole::Support);

    let missing = repo.set_active(uuid::Uuid::new_v4(), true).await;
    assert!(matches!(missing, Err(sea_orm::DbErr::RecordNotFound(_))));
}

#[tokio::test]
async fn test_list_searches_username_and_email() {
    let Some(db) = common::setup().await else {
        return;
    };
    let user = common::create_user(&db, dec!(0)).await;
    let repo = UserRepository::new(db.clone());

    let page = repo
        .list(
            &UserFilter {
                search: Some(user.username.to_uppercase()),
                ..UserFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, user.id);
}
