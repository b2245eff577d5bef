//! Referral repository.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::entities::{referrals, sea_orm_active_enums::ReferralStatus, users};

/// A referral together with the referred user's public name.
#[derive(Debug, Clone)]
pub struct ReferralWithUser {
    /// The referral row.
    pub referral: referrals::Model,
    /// Username of the referred user.
    pub referred_username: String,
}

/// Referral repository.
#[derive(Debug, Clone)]
pub struct ReferralRepository {
    db: DatabaseConnection,
}

impl ReferralRepository {
    /// Creates a new referral repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records that `referrer_id` brought in `referred_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails, including when the referred user
    /// already has a referrer.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        referrer_id: Uuid,
        referred_id: Uuid,
    ) -> Result<referrals::Model, DbErr> {
        let now = Utc::now().into();
        let referral = referrals::ActiveModel {
            id: Set(Uuid::now_v7()),
            referrer_id: Set(referrer_id),
            referred_id: Set(referred_id),
            commission_amount: Set(Decimal::ZERO),
            status: Set(ReferralStatus::Pending),
            transaction_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        referral.insert(conn).await
    }

    /// Finds the pending referral of a referred user and locks it.
    ///
    /// A concurrent caller waits for the lock and then no longer sees the
    /// row once it has been rewarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_pending_for_referred_in<C: ConnectionTrait>(
        conn: &C,
        referred_id: Uuid,
    ) -> Result<Option<referrals::Model>, DbErr> {
        referrals::Entity::find()
            .filter(referrals::Column::ReferredId.eq(referred_id))
            .filter(referrals::Column::Status.eq(ReferralStatus::Pending))
            .lock_exclusive()
            .one(conn)
            .await
    }

    /// Marks a pending referral as rewarded.
    ///
    /// Returns false if the referral was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn reward_in<C: ConnectionTrait>(
        conn: &C,
        referral_id: Uuid,
        commission: Decimal,
        transaction_id: Uuid,
    ) -> Result<bool, DbErr> {
        let result = referrals::Entity::update_many()
            .col_expr(referrals::Column::Status, Expr::value(ReferralStatus::Rewarded))
            .col_expr(referrals::Column::CommissionAmount, Expr::value(commission))
            .col_expr(referrals::Column::TransactionId, Expr::value(transaction_id))
            .col_expr(
                referrals::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(referrals::Column::Id.eq(referral_id))
            .filter(referrals::Column::Status.eq(ReferralStatus::Pending))
            .exec(conn)
            .await?;

        if result.rows_affected > 0 {
            info!(%referral_id, %commission, "Referral rewarded");
        }
        Ok(result.rows_affected > 0)
    }

    /// Lists the referrals made by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_referrer(
        &self,
        referrer_id: Uuid,
    ) -> Result<Vec<ReferralWithUser>, DbErr> {
        let referrals = referrals::Entity::find()
            .filter(referrals::Column::ReferrerId.eq(referrer_id))
            .order_by_desc(referrals::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let ids: Vec<Uuid> = referrals.iter().map(|r| r.referred_id).collect();
        let names: HashMap<Uuid, String> = users::Entity::find()
            .filter(users::Column::Id.is_in(ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        Ok(referrals
            .into_iter()
            .map(|referral| ReferralWithUser {
                referred_username: names
                    .get(&referral.referred_id)
                    .cloned()
                    .unwrap_or_default(),
                referral,
            })
            .collect())
    }
}

/// Sum of the commissions actually paid out.
#[must_use]
pub fn total_earned(referrals: &[ReferralWithUser]) -> Decimal {
    referrals
        .iter()
        .filter(|r| r.referral.status == ReferralStatus::Rewarded)
        .map(|r| r.referral.commission_amount)
        .sum()
}
