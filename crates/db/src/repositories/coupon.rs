//! Coupon repository: definitions, redemptions, and reversals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;
use uuid::Uuid;

use cambio_core::coupon::{CouponError, CouponService, CouponType as CoreType, Discount};
use cambio_shared::types::{PageRequest, PageResponse};

use crate::entities::{
    coupon_redemptions, coupons,
    sea_orm_active_enums::{CouponStatus, CouponType, RedemptionStatus},
};

/// Error types for coupon repository operations.
#[derive(Debug, thiserror::Error)]
pub enum CouponRepoError {
    /// Coupon rule violation.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Coupon code already exists.
    #[error("Coupon code already exists: {0}")]
    DuplicateCode(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a coupon.
#[derive(Debug, Clone)]
pub struct CreateCouponInput {
    /// Code as entered; stored upper-case.
    pub code: String,
    /// Discount kind.
    pub kind: CoreType,
    /// Percent or fixed amount; ignored for free trials.
    pub value: Decimal,
    /// Redemption cap, `None` for unlimited.
    pub max_redemptions: Option<i32>,
    /// Minimum purchase amount.
    pub min_purchase_amount: Option<Decimal>,
    /// Window start, inclusive.
    pub starts_at: Option<DateTime<Utc>>,
    /// Window end, inclusive.
    pub ends_at: Option<DateTime<Utc>>,
    /// Stored for reporting; one coupon applies per purchase.
    pub is_stackable: bool,
}

/// Partial update of a coupon. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateCouponInput {
    /// New value.
    pub value: Option<Decimal>,
    /// New cap; `Some(None)` removes it.
    pub max_redemptions: Option<Option<i32>>,
    /// New minimum; `Some(None)` removes it.
    pub min_purchase_amount: Option<Option<Decimal>>,
    /// New window start.
    pub starts_at: Option<Option<DateTime<Utc>>>,
    /// New window end.
    pub ends_at: Option<Option<DateTime<Utc>>>,
    /// Switch on or off.
    pub is_active: Option<bool>,
    /// New stackable flag.
    pub is_stackable: Option<bool>,
}

/// Coupon repository.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    db: DatabaseConnection,
}

impl CouponRepository {
    /// Creates a new coupon repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a coupon by code, after normalising it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<coupons::Model>, DbErr> {
        Self::find_by_code_in(&self.db, code).await
    }

    /// Finds a coupon by code on the given connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_code_in<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<coupons::Model>, DbErr> {
        coupons::Entity::find()
            .filter(coupons::Column::Code.eq(CouponService::normalize_code(code)))
            .one(conn)
            .await
    }

    /// Finds a coupon by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<coupons::Model>, DbErr> {
        coupons::Entity::find_by_id(id).one(&self.db).await
    }

    /// Creates a coupon.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::InvalidDefinition` for a malformed definition or
    /// `CouponRepoError::DuplicateCode` if the code is taken.
    pub async fn create(&self, input: CreateCouponInput) -> Result<coupons::Model, CouponRepoError> {
        CouponService::validate_definition(
            input.kind,
            input.value,
            input.max_redemptions,
            input.starts_at,
            input.ends_at,
        )?;

        let code = CouponService::normalize_code(&input.code);
        if code.is_empty() {
            return Err(CouponError::InvalidDefinition("code cannot be empty".into()).into());
        }
        if self.find_by_code(&code).await?.is_some() {
            return Err(CouponRepoError::DuplicateCode(code));
        }

        let now = Utc::now().into();
        let value = if input.kind == CoreType::FreeTrial {
            Decimal::ZERO
        } else {
            input.value
        };
        let coupon = coupons::ActiveModel {
            id: Set(Uuid::now_v7()),
            code: Set(code),
            coupon_type: Set(CouponType::from(input.kind)),
            value: Set(value),
            max_redemptions: Set(input.max_redemptions),
            usage_count: Set(0),
            min_purchase_amount: Set(input.min_purchase_amount),
            status: Set(CouponStatus::Active),
            starts_at: Set(input.starts_at.map(Into::into)),
            ends_at: Set(input.ends_at.map(Into::into)),
            is_stackable: Set(input.is_stackable),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let coupon = coupon.insert(&self.db).await?;
        info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
        Ok(coupon)
    }

    /// Updates a coupon.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::NotFound` if the coupon does not exist or
    /// `CouponError::InvalidDefinition` if the result would be malformed.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateCouponInput,
    ) -> Result<coupons::Model, CouponRepoError> {
        let coupon = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| CouponError::NotFound(id.to_string()))?;

        let value = input.value.unwrap_or(coupon.value);
        let max_redemptions = input.max_redemptions.unwrap_or(coupon.max_redemptions);
        let starts_at = input
            .starts_at
            .unwrap_or_else(|| coupon.starts_at.map(Into::into));
        let ends_at = input.ends_at.unwrap_or_else(|| coupon.ends_at.map(Into::into));

        CouponService::validate_definition(
            coupon.coupon_type.into(),
            value,
            max_redemptions,
            starts_at,
            ends_at,
        )?;
        if max_redemptions.is_some_and(|max| max < coupon.usage_count) {
            return Err(CouponError::InvalidDefinition(format!(
                "max redemptions cannot be below current usage {}",
                coupon.usage_count
            ))
            .into());
        }

        let mut active: coupons::ActiveModel = coupon.into();
        active.value = Set(value);
        active.max_redemptions = Set(max_redemptions);
        active.starts_at = Set(starts_at.map(Into::into));
        active.ends_at = Set(ends_at.map(Into::into));
        if let Some(minimum) = input.min_purchase_amount {
            active.min_purchase_amount = Set(minimum);
        }
        if let Some(is_active) = input.is_active {
            active.status = Set(if is_active {
                CouponStatus::Active
            } else {
                CouponStatus::Inactive
            });
        }
        if let Some(is_stackable) = input.is_stackable {
            active.is_stackable = Set(is_stackable);
        }
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(&self.db).await?)
    }

    /// Switches a coupon off. Redeemed coupons are never hard-deleted.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::NotFound` if the coupon does not exist.
    pub async fn deactivate(&self, id: Uuid) -> Result<coupons::Model, CouponRepoError> {
        self.update(
            id,
            UpdateCouponInput {
                is_active: Some(false),
                ..UpdateCouponInput::default()
            },
        )
        .await
    }

    /// Lists coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, page: PageRequest) -> Result<PageResponse<coupons::Model>, DbErr> {
        let query = coupons::Entity::find();
        let total = query.clone().count(&self.db).await?;
        let items = query
            .order_by_desc(coupons::Column::CreatedAt)
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.db)
            .await?;

        Ok(PageResponse::new(items, page, total))
    }

    /// Counts one use of a coupon and records the redemption.
    ///
    /// The increment is conditional on the coupon still being active and
    /// under its cap. When it matches no row nothing is inserted.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Exhausted` if the cap was reached concurrently or
    /// `CouponError::Inactive` if the coupon was switched off.
    pub async fn redeem_in<C: ConnectionTrait>(
        conn: &C,
        coupon_id: Uuid,
        user_id: Uuid,
        transaction_id: Option<Uuid>,
        discount: &Discount,
    ) -> Result<coupon_redemptions::Model, CouponRepoError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let result = coupons::Entity::update_many()
            .col_expr(
                coupons::Column::UsageCount,
                Expr::col(coupons::Column::UsageCount).add(1),
            )
            .col_expr(coupons::Column::UpdatedAt, Expr::value(now))
            .filter(coupons::Column::Id.eq(coupon_id))
            .filter(coupons::Column::Status.eq(CouponStatus::Active))
            .filter(
                Condition::any()
                    .add(coupons::Column::MaxRedemptions.is_null())
                    .add(
                        Expr::col(coupons::Column::UsageCount)
                            .lt(Expr::col(coupons::Column::MaxRedemptions)),
                    ),
            )
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let coupon = coupons::Entity::find_by_id(coupon_id)
                .one(conn)
                .await?
                .ok_or_else(|| CouponError::NotFound(coupon_id.to_string()))?;
            return Err(if coupon.status == CouponStatus::Active {
                CouponError::Exhausted
            } else {
                CouponError::Inactive
            }
            .into());
        }

        let redemption = coupon_redemptions::ActiveModel {
            id: Set(Uuid::now_v7()),
            coupon_id: Set(coupon_id),
            user_id: Set(user_id),
            transaction_id: Set(transaction_id),
            discount_value: Set(discount.discount),
            final_amount: Set(discount.final_amount),
            status: Set(RedemptionStatus::Applied),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let redemption = redemption.insert(conn).await?;
        info!(%coupon_id, %user_id, discount = %discount.discount, "Coupon redeemed");
        Ok(redemption)
    }

    /// Gives back the coupon use reserved by a payment that did not complete.
    ///
    /// Returns `None` if the transaction had no applied redemption.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn reverse_for_transaction_in<C: ConnectionTrait>(
        conn: &C,
        transaction_id: Uuid,
    ) -> Result<Option<coupon_redemptions::Model>, DbErr> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let reversed = coupon_redemptions::Entity::update_many()
            .col_expr(
                coupon_redemptions::Column::Status,
                Expr::value(RedemptionStatus::Reversed),
            )
            .col_expr(coupon_redemptions::Column::UpdatedAt, Expr::value(now))
            .filter(coupon_redemptions::Column::TransactionId.eq(transaction_id))
            .filter(coupon_redemptions::Column::Status.eq(RedemptionStatus::Applied))
            .exec_with_returning(conn)
            .await?;

        let Some(redemption) = reversed.into_iter().next() else {
            return Ok(None);
        };

        coupons::Entity::update_many()
            .col_expr(
                coupons::Column::UsageCount,
                Expr::col(coupons::Column::UsageCount).sub(1),
            )
            .col_expr(coupons::Column::UpdatedAt, Expr::value(now))
            .filter(coupons::Column::Id.eq(redemption.coupon_id))
            .filter(coupons::Column::UsageCount.gt(0))
            .exec(conn)
            .await?;

        info!(
            coupon_id = %redemption.coupon_id,
            %transaction_id,
            "Coupon redemption reversed"
        );
        Ok(Some(redemption))
    }

    /// Finds the redemption attached to a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_redemption_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<coupon_redemptions::Model>, DbErr> {
        coupon_redemptions::Entity::find()
            .filter(coupon_redemptions::Column::TransactionId.eq(transaction_id))
            .one(&self.db)
            .await
    }
}
