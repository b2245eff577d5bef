//! Response bodies shared by several route modules.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use cambio_db::entities::{
    coupons, plans,
    sea_orm_active_enums::{
        CouponStatus, CouponType, PlanStatus, TransactionStatus, TransactionType, UserPlanStatus,
        UserRole,
    },
    transactions, user_plans, users,
};
use cambio_shared::auth::UserInfo;

/// A wallet transaction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    pub target_currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub fees: Decimal,
    pub reference: Option<String>,
    pub metadata: serde_json::Value,
    pub processed_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<transactions::Model> for TransactionView {
    fn from(t: transactions::Model) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            kind: t.transaction_type,
            status: t.status,
            amount: t.amount,
            currency: t.currency,
            target_currency: t.target_currency,
            exchange_rate: t.exchange_rate,
            fees: t.fees,
            reference: t.reference,
            metadata: t.metadata,
            processed_at: t.processed_at,
            created_at: t.created_at,
        }
    }
}

/// A user as seen by administrators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub wallet_balance: Decimal,
    pub currency: String,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<users::Model> for UserView {
    fn from(u: users::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            is_active: u.is_active,
            wallet_balance: u.wallet_balance,
            currency: u.currency,
            referral_code: u.referral_code,
            referred_by: u.referred_by,
            created_at: u.created_at,
        }
    }
}

/// The signed-in user's own profile.
pub fn user_info(u: &users::Model) -> UserInfo {
    UserInfo {
        id: u.id,
        username: u.username.clone(),
        email: u.email.clone(),
        role: cambio_core::auth::UserRole::from(u.role).as_str().to_string(),
        wallet_balance: u.wallet_balance,
        currency: u.currency.clone(),
        referral_code: u.referral_code.clone(),
    }
}

/// A subscription plan.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub features: Vec<String>,
    pub status: PlanStatus,
    pub referral_commission_rate: Decimal,
    pub duration_days: i32,
}

impl From<plans::Model> for PlanView {
    fn from(p: plans::Model) -> Self {
        Self {
            features: p.feature_list(),
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            currency: p.currency,
            status: p.status,
            referral_commission_rate: p.referral_commission_rate,
            duration_days: p.duration_days,
        }
    }
}

/// A user's subscription together with its plan.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: Uuid,
    pub status: UserPlanStatus,
    pub started_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
    pub transaction_id: Option<Uuid>,
    pub plan: PlanView,
}

impl SubscriptionView {
    /// Combines a subscription row with its plan.
    pub fn new(subscription: user_plans::Model, plan: plans::Model) -> Self {
        Self {
            id: subscription.id,
            status: subscription.status,
            started_at: subscription.started_at,
            expires_at: subscription.expires_at,
            transaction_id: subscription.transaction_id,
            plan: plan.into(),
        }
    }
}

/// A coupon as managed by administrators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    pub id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponType,
    pub value: Decimal,
    pub max_redemptions: Option<i32>,
    pub usage_count: i32,
    pub min_purchase_amount: Option<Decimal>,
    pub status: CouponStatus,
    pub starts_at: Option<DateTime<FixedOffset>>,
    pub ends_at: Option<DateTime<FixedOffset>>,
    pub is_stackable: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl From<coupons::Model> for CouponView {
    fn from(c: coupons::Model) -> Self {
        Self {
            id: c.id,
            code: c.code,
            kind: c.coupon_type,
            value: c.value,
            max_redemptions: c.max_redemptions,
            usage_count: c.usage_count,
            min_purchase_amount: c.min_purchase_amount,
            status: c.status,
            starts_at: c.starts_at,
            ends_at: c.ends_at,
            is_stackable: c.is_stackable,
            created_at: c.created_at,
        }
    }
}
