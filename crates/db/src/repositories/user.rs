//! User repository for database operations.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use cambio_core::auth::UserRole as CoreRole;
use cambio_shared::types::{PageRequest, PageResponse};

use crate::entities::{sea_orm_active_enums::UserRole, users};

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Unique username.
    pub username: String,
    /// Unique email.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Platform role.
    pub role: CoreRole,
    /// Wallet currency.
    pub currency: String,
    /// The user's own referral code.
    pub referral_code: String,
    /// The referrer, if any.
    pub referred_by: Option<Uuid>,
}

/// Filters for the admin user listing.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive match on username or email.
    pub search: Option<String>,
    /// Restrict to one role.
    pub role: Option<CoreRole>,
    /// Restrict to active or disabled users.
    pub is_active: Option<bool>,
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(lower_eq(users::Column::Email, email))
            .one(&self.db)
            .await
    }

    /// Finds a user by username, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(lower_eq(users::Column::Username, username))
            .one(&self.db)
            .await
    }

    /// Finds a user by username or email, as typed at login.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(
                Condition::any()
                    .add(lower_eq(users::Column::Username, identifier))
                    .add(lower_eq(users::Column::Email, identifier)),
            )
            .one(&self.db)
            .await
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(&self.db).await
    }

    /// Finds a user by ID on the given connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(conn).await
    }

    /// Finds the owner of a referral code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_referral_code(&self, code: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::ReferralCode.eq(code.trim().to_uppercase()))
            .one(&self.db)
            .await
    }

    /// Creates a new user on the given connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails, including unique
    /// violations on username, email, or referral code.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        input: CreateUserInput,
    ) -> Result<users::Model, DbErr> {
        let now = Utc::now().into();
        let user = users::ActiveModel {
            id: Set(Uuid::now_v7()),
            username: Set(input.username),
            email: Set(input.email.to_lowercase()),
            password_hash: Set(input.password_hash),
            role: Set(UserRole::from(input.role)),
            is_active: Set(true),
            wallet_balance: Set(Decimal::ZERO),
            currency: Set(input.currency),
            referral_code: Set(input.referral_code),
            referred_by: Set(input.referred_by),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(conn).await
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// See [`Self::create_in`].
    pub async fn create(&self, input: CreateUserInput) -> Result<users::Model, DbErr> {
        Self::create_in(&self.db, input).await
    }

    /// Lists users matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<PageResponse<users::Model>, DbErr> {
        let mut query = users::Entity::find();

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{term}%");
            query = query.filter(
                Condition::any()
                    .add(Expr::col(users::Column::Username).ilike(pattern.clone()))
                    .add(Expr::col(users::Column::Email).ilike(pattern)),
            );
        }

        if let Some(role) = filter.role {
            query = query.filter(users::Column::Role.eq(UserRole::from(role)));
        }

        if let Some(is_active) = filter.is_active {
            query = query.filter(users::Column::IsActive.eq(is_active));
        }

        let total = query.clone().count(&self.db).await?;
        let items = query
            .order_by_desc(users::Column::CreatedAt)
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.db)
            .await?;

        Ok(PageResponse::new(items, page, total))
    }

    /// Enables or disables a user.
    ///
    /// # Errors
    ///
    /// Returns `DbErr::RecordNotFound` if the user does not exist.
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<users::Model, DbErr> {
        let user = self.require(id).await?;
        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await
    }

    /// Changes a user's role.
    ///
    /// # Errors
    ///
    /// Returns `DbErr::RecordNotFound` if the user does not exist.
    pub async fn set_role(&self, id: Uuid, role: CoreRole) -> Result<users::Model, DbErr> {
        let user = self.require(id).await?;
        let mut active: users::ActiveModel = user.into();
        active.role = Set(UserRole::from(role));
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await
    }

    /// Lists users referred by `referrer_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_referred(&self, referrer_id: Uuid) -> Result<Vec<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::ReferredBy.eq(referrer_id))
            .order_by_desc(users::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    /// Checks if an email is already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn email_exists(&self, email: &str) -> Result<bool, DbErr> {
        let count = users::Entity::find()
            .filter(lower_eq(users::Column::Email, email))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Checks if a username is already taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn username_exists(&self, username: &str) -> Result<bool, DbErr> {
        let count = users::Entity::find()
            .filter(lower_eq(users::Column::Username, username))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn require(&self, id: Uuid) -> Result<users::Model, DbErr> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {id}")))
    }
}

fn lower_eq(column: users::Column, value: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).eq(value.trim().to_lowercase())
}
