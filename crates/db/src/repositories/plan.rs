//! Plan and subscription repository.
//!
//! A user has at most one `active` subscription. Activation expires the
//! previous one in the same database transaction, and the partial unique
//! index `idx_user_plans_one_active` rejects anything that slips past.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use cambio_core::subscription::{
    PlanStatus as CorePlanStatus, PlanTerms, SubscriptionError, SubscriptionService,
};

use crate::entities::{
    plans,
    sea_orm_active_enums::{PlanStatus, UserPlanStatus},
    user_plans,
};

/// Error types for plan repository operations.
#[derive(Debug, thiserror::Error)]
pub enum PlanRepoError {
    /// Subscription rule violation.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Plan not found.
    #[error("Plan not found: {0}")]
    NotFound(Uuid),

    /// Plan name already exists.
    #[error("Plan name already exists: {0}")]
    DuplicateName(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a plan.
#[derive(Debug, Clone)]
pub struct CreatePlanInput {
    /// Unique name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Price per period.
    pub price: Decimal,
    /// Currency of the price.
    pub currency: String,
    /// Feature strings, in display order.
    pub features: Vec<String>,
    /// Initial status.
    pub status: CorePlanStatus,
    /// Percent of each charge paid to the referrer.
    pub referral_commission_rate: Decimal,
    /// Days one purchase lasts.
    pub duration_days: i32,
}

/// Partial update of a plan. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlanInput {
    /// New description.
    pub description: Option<String>,
    /// New price.
    pub price: Option<Decimal>,
    /// New features.
    pub features: Option<Vec<String>>,
    /// New status.
    pub status: Option<CorePlanStatus>,
    /// New commission rate.
    pub referral_commission_rate: Option<Decimal>,
    /// New duration.
    pub duration_days: Option<i32>,
}

/// Plan and subscription repository.
#[derive(Debug, Clone)]
pub struct PlanRepository {
    db: DatabaseConnection,
}

impl PlanRepository {
    /// Creates a new plan repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists plans on sale, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_active(&self) -> Result<Vec<plans::Model>, DbErr> {
        plans::Entity::find()
            .filter(plans::Column::Status.eq(PlanStatus::Active))
            .order_by_asc(plans::Column::Price)
            .all(&self.db)
            .await
    }

    /// Lists every plan regardless of status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<plans::Model>, DbErr> {
        plans::Entity::find()
            .order_by_asc(plans::Column::Price)
            .all(&self.db)
            .await
    }

    /// Finds a plan by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<plans::Model>, DbErr> {
        plans::Entity::find_by_id(id).one(&self.db).await
    }

    /// Creates a plan.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::InvalidPlan` for bad terms or
    /// `PlanRepoError::DuplicateName` if the name is taken.
    pub async fn create(&self, input: CreatePlanInput) -> Result<plans::Model, PlanRepoError> {
        SubscriptionService::validate_terms(&PlanTerms {
            price: input.price,
            duration_days: input.duration_days,
            referral_commission_rate: input.referral_commission_rate,
            status: input.status,
        })?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(SubscriptionError::InvalidPlan("name cannot be empty".into()).into());
        }
        let taken = plans::Entity::find()
            .filter(plans::Column::Name.eq(name.as_str()))
            .one(&self.db)
            .await?
            .is_some();
        if taken {
            return Err(PlanRepoError::DuplicateName(name));
        }

        let now = Utc::now().into();
        let plan = plans::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name),
            description: Set(input.description),
            price: Set(input.price),
            currency: Set(input.currency.to_uppercase()),
            features: Set(features_json(input.features)),
            status: Set(PlanStatus::from(input.status)),
            referral_commission_rate: Set(input.referral_commission_rate),
            duration_days: Set(input.duration_days),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let plan = plan.insert(&self.db).await?;
        info!(plan_id = %plan.id, name = %plan.name, "Plan created");
        Ok(plan)
    }

    /// Updates a plan.
    ///
    /// # Errors
    ///
    /// Returns `PlanRepoError::NotFound` or a terms validation error.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdatePlanInput,
    ) -> Result<plans::Model, PlanRepoError> {
        let plan = self.find_by_id(id).await?.ok_or(PlanRepoError::NotFound(id))?;

        let terms = PlanTerms {
            price: input.price.unwrap_or(plan.price),
            duration_days: input.duration_days.unwrap_or(plan.duration_days),
            referral_commission_rate: input
                .referral_commission_rate
                .unwrap_or(plan.referral_commission_rate),
            status: input.status.unwrap_or_else(|| plan.status.into()),
        };
        SubscriptionService::validate_terms(&terms)?;

        let mut active: plans::ActiveModel = plan.into();
        active.price = Set(terms.price);
        active.duration_days = Set(terms.duration_days);
        active.referral_commission_rate = Set(terms.referral_commission_rate);
        active.status = Set(PlanStatus::from(terms.status));
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(features) = input.features {
            active.features = Set(features_json(features));
        }
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(&self.db).await?)
    }

    /// Returns the user's current subscription.
    ///
    /// An `active` row past its `expires_at` is marked `expired` on read and
    /// not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_active_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(user_plans::Model, plans::Model)>, DbErr> {
        let found = user_plans::Entity::find()
            .filter(user_plans::Column::UserId.eq(user_id))
            .filter(user_plans::Column::Status.eq(UserPlanStatus::Active))
            .find_also_related(plans::Entity)
            .one(&self.db)
            .await?;

        let Some((subscription, Some(plan))) = found else {
            return Ok(None);
        };

        if subscription.expires_at < Utc::now() {
            let mut active: user_plans::ActiveModel = subscription.into();
            active.status = Set(UserPlanStatus::Expired);
            active.updated_at = Set(Utc::now().into());
            active.update(&self.db).await?;
            return Ok(None);
        }

        Ok(Some((subscription, plan)))
    }

    /// Activates a plan for a user, expiring any previous active subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn activate_in<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        plan: &plans::Model,
        transaction_id: Option<Uuid>,
    ) -> Result<user_plans::Model, DbErr> {
        Self::expire_active_in(conn, user_id).await?;

        let (started_at, expires_at) =
            SubscriptionService::activation_window(Utc::now(), plan.duration_days);
        let now = Utc::now().into();
        let subscription = user_plans::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id),
            plan_id: Set(plan.id),
            status: Set(UserPlanStatus::Active),
            started_at: Set(started_at.into()),
            expires_at: Set(expires_at.into()),
            transaction_id: Set(transaction_id),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let subscription = subscription.insert(conn).await?;
        info!(%user_id, plan_id = %plan.id, expires_at = %expires_at, "Subscription activated");
        Ok(subscription)
    }

    /// Records a subscription awaiting gateway payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create_pending_in<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        plan: &plans::Model,
        transaction_id: Uuid,
    ) -> Result<user_plans::Model, DbErr> {
        let (started_at, expires_at) =
            SubscriptionService::activation_window(Utc::now(), plan.duration_days);
        let now = Utc::now().into();
        let subscription = user_plans::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id),
            plan_id: Set(plan.id),
            status: Set(UserPlanStatus::Pending),
            started_at: Set(started_at.into()),
            expires_at: Set(expires_at.into()),
            transaction_id: Set(Some(transaction_id)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        subscription.insert(conn).await
    }

    /// Activates the pending subscription paid by `transaction_id`.
    ///
    /// The activation window starts now, not when the payment was initiated.
    /// Returns the subscription and its plan, or `None` if no pending
    /// subscription belongs to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn activate_pending_in<C: ConnectionTrait>(
        conn: &C,
        transaction_id: Uuid,
    ) -> Result<Option<(user_plans::Model, plans::Model)>, DbErr> {
        let found = user_plans::Entity::find()
            .filter(user_plans::Column::TransactionId.eq(transaction_id))
            .filter(user_plans::Column::Status.eq(UserPlanStatus::Pending))
            .find_also_related(plans::Entity)
            .one(conn)
            .await?;

        let Some((pending, Some(plan))) = found else {
            return Ok(None);
        };

        Self::expire_active_in(conn, pending.user_id).await?;

        let (started_at, expires_at) =
            SubscriptionService::activation_window(Utc::now(), plan.duration_days);
        let user_id = pending.user_id;
        let mut active: user_plans::ActiveModel = pending.into();
        active.status = Set(UserPlanStatus::Active);
        active.started_at = Set(started_at.into());
        active.expires_at = Set(expires_at.into());
        active.updated_at = Set(Utc::now().into());
        let subscription = active.update(conn).await?;

        info!(%user_id, plan_id = %plan.id, %transaction_id, "Subscription activated");
        Ok(Some((subscription, plan)))
    }

    /// Abandons the pending subscription of a payment that did not complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn cancel_pending_in<C: ConnectionTrait>(
        conn: &C,
        transaction_id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = user_plans::Entity::update_many()
            .col_expr(
                user_plans::Column::Status,
                Expr::value(UserPlanStatus::Cancelled),
            )
            .col_expr(
                user_plans::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(user_plans::Column::TransactionId.eq(transaction_id))
            .filter(user_plans::Column::Status.eq(UserPlanStatus::Pending))
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Cancels the user's active subscription. No refund is issued.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::NoActiveSubscription` if there is nothing
    /// to cancel.
    pub async fn cancel_active(&self, user_id: Uuid) -> Result<user_plans::Model, PlanRepoError> {
        let (subscription, _) = self
            .find_active_for_user(user_id)
            .await?
            .ok_or(SubscriptionError::NoActiveSubscription)?;

        SubscriptionService::ensure_cancellable(subscription.status.into())?;

        let mut active: user_plans::ActiveModel = subscription.into();
        active.status = Set(UserPlanStatus::Cancelled);
        active.updated_at = Set(Utc::now().into());
        let subscription = active.update(&self.db).await?;

        info!(%user_id, subscription_id = %subscription.id, "Subscription cancelled");
        Ok(subscription)
    }

    async fn expire_active_in<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64, DbErr> {
        let result = user_plans::Entity::update_many()
            .col_expr(user_plans::Column::Status, Expr::value(UserPlanStatus::Expired))
            .col_expr(
                user_plans::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(user_plans::Column::UserId.eq(user_id))
            .filter(user_plans::Column::Status.eq(UserPlanStatus::Active))
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }
}

fn features_json(features: Vec<String>) -> Value {
    Value::Array(features.into_iter().map(Value::String).collect())
}

