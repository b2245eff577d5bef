//! Transaction repository: recording and finalizing wallet transactions.
//!
//! A transaction leaves `pending` through a conditional update that only
//! matches pending rows. Whichever caller flips the status owns the side
//! effects; every other caller gets `TransactionError::InvalidState`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use cambio_core::transaction::{
    Outcome, TransactionError, TransactionFilter, TransactionLifecycle,
    TransactionStatus as CoreStatus, TransactionType as CoreType,
};
use cambio_shared::types::{PageRequest, PageResponse};

use crate::entities::{
    sea_orm_active_enums::{TransactionStatus, TransactionType},
    transactions,
};

/// Error types for transaction repository operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionRepoError {
    /// Lifecycle rule violation.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl TransactionRepoError {
    /// Returns true if the row had already left `pending`.
    #[must_use]
    pub const fn is_already_final(&self) -> bool {
        matches!(
            self,
            Self::Transaction(TransactionError::InvalidState { .. } | TransactionError::NotPending(_))
        )
    }
}

/// Input for recording a transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Owner.
    pub user_id: Uuid,
    /// Transaction type.
    pub kind: CoreType,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Fees charged on top of the amount.
    pub fees: Decimal,
    /// Gateway or internal reference.
    pub reference: Option<String>,
    /// Target currency for exchanges.
    pub target_currency: Option<String>,
    /// Rate applied for exchanges.
    pub exchange_rate: Option<Decimal>,
    /// Free-form JSON object.
    pub metadata: Value,
}

impl NewTransaction {
    /// Creates an input with no fees, reference, or metadata.
    #[must_use]
    pub fn new(user_id: Uuid, kind: CoreType, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            user_id,
            kind,
            amount,
            currency: currency.into(),
            fees: Decimal::ZERO,
            reference: None,
            target_currency: None,
            exchange_rate: None,
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    /// Sets the reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets the fees.
    #[must_use]
    pub const fn with_fees(mut self, fees: Decimal) -> Self {
        self.fees = fees;
        self
    }

    /// Sets the metadata object.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the exchange target and rate.
    #[must_use]
    pub fn with_exchange(mut self, target_currency: impl Into<String>, rate: Decimal) -> Self {
        self.target_currency = Some(target_currency.into());
        self.exchange_rate = Some(rate);
        self
    }
}

/// Transaction repository.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a pending transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::InvalidAmount`, `TooPrecise` or
    /// `InvalidCurrency` for bad input, or a database error (including a duplicate reference).
    pub async fn create_pending(
        &self,
        input: NewTransaction,
    ) -> Result<transactions::Model, TransactionRepoError> {
        Self::create_pending_in(&self.db, input).await
    }

    /// Records a pending transaction on the given connection.
    ///
    /// # Errors
    ///
    /// See [`Self::create_pending`].
    pub async fn create_pending_in<C: ConnectionTrait>(
        conn: &C,
        input: NewTransaction,
    ) -> Result<transactions::Model, TransactionRepoError> {
        Self::insert(conn, input, CoreStatus::Pending).await
    }

    /// Records a transaction that is final from the start, such as a transfer leg.
    ///
    /// # Errors
    ///
    /// See [`Self::create_pending`].
    pub async fn create_completed_in<C: ConnectionTrait>(
        conn: &C,
        input: NewTransaction,
    ) -> Result<transactions::Model, TransactionRepoError> {
        Self::insert(conn, input, CoreStatus::Completed).await
    }

    async fn insert<C: ConnectionTrait>(
        conn: &C,
        input: NewTransaction,
        status: CoreStatus,
    ) -> Result<transactions::Model, TransactionRepoError> {
        let currency = TransactionLifecycle::validate_new(input.amount, &input.currency)?;
        TransactionLifecycle::validate_fee(input.fees)?;

        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let processed_at = status.is_terminal().then_some(now);
        let transaction = transactions::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.user_id),
            transaction_type: Set(TransactionType::from(input.kind)),
            status: Set(TransactionStatus::from(status)),
            amount: Set(input.amount),
            currency: Set(currency),
            target_currency: Set(input.target_currency),
            exchange_rate: Set(input.exchange_rate),
            fees: Set(input.fees),
            reference: Set(input.reference),
            metadata: Set(TransactionLifecycle::merge_metadata(Value::Null, input.metadata)),
            processed_at: Set(processed_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(transaction.insert(conn).await?)
    }

    /// Moves a pending transaction into its final status in its own database
    /// transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::finalize_in`].
    pub async fn finalize(
        &self,
        id: Uuid,
        outcome: Outcome,
        extra_metadata: Value,
    ) -> Result<transactions::Model, TransactionRepoError> {
        let txn = self.db.begin().await?;
        let transaction = Self::finalize_in(&txn, id, outcome, extra_metadata).await?;
        txn.commit().await?;
        Ok(transaction)
    }

    /// Moves a pending transaction into its final status.
    ///
    /// The status flip is a single `UPDATE ... WHERE status = 'pending'`. The
    /// updated row stays locked until the surrounding transaction ends, so
    /// the metadata merge that follows cannot interleave with another writer.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `TransactionError::NotFound` if no such transaction exists
    /// - `TransactionError::InvalidState` if it is no longer pending
    pub async fn finalize_in<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        outcome: Outcome,
        extra_metadata: Value,
    ) -> Result<transactions::Model, TransactionRepoError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let updated = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::Status,
                Expr::value(TransactionStatus::from(outcome.status())),
            )
            .col_expr(transactions::Column::ProcessedAt, Expr::value(now))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now))
            .filter(transactions::Column::Id.eq(id))
            .filter(transactions::Column::Status.eq(TransactionStatus::Pending))
            .exec_with_returning(conn)
            .await?;

        let Some(row) = updated.into_iter().next() else {
            let existing = transactions::Entity::find_by_id(id)
                .one(conn)
                .await?
                .ok_or_else(|| TransactionError::NotFound(id.to_string()))?;

            warn!(
                transaction_id = %id,
                status = %CoreStatus::from(existing.status),
                ?outcome,
                "Finalize skipped, transaction already final"
            );
            TransactionLifecycle::finalize(existing.status.into(), outcome)?;
            return Err(TransactionError::NotPending(id).into());
        };

        info!(
            transaction_id = %id,
            reference = row.reference.as_deref().unwrap_or_default(),
            status = %outcome.status(),
            "Transaction finalized"
        );

        if is_empty(&extra_metadata) {
            return Ok(row);
        }

        let merged = TransactionLifecycle::merge_metadata(row.metadata.clone(), extra_metadata);
        let mut active: transactions::ActiveModel = row.into();
        active.metadata = Set(merged);
        Ok(active.update(conn).await?)
    }

    /// Merges keys into a transaction's metadata without touching its status.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::NotFound` if the transaction does not exist.
    pub async fn annotate(
        &self,
        id: Uuid,
        extra_metadata: Value,
    ) -> Result<transactions::Model, TransactionRepoError> {
        let txn = self.db.begin().await?;
        let row = transactions::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| TransactionError::NotFound(id.to_string()))?;

        let merged = TransactionLifecycle::merge_metadata(row.metadata.clone(), extra_metadata);
        let mut active: transactions::ActiveModel = row.into();
        active.metadata = Set(merged);
        let row = active.update(&txn).await?;
        txn.commit().await?;
        Ok(row)
    }

    /// Finds a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<transactions::Model>, DbErr> {
        transactions::Entity::find_by_id(id).one(&self.db).await
    }

    /// Finds a transaction by its gateway reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<transactions::Model>, DbErr> {
        transactions::Entity::find()
            .filter(transactions::Column::Reference.eq(reference))
            .one(&self.db)
            .await
    }

    /// Finds a transaction owned by a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<transactions::Model>, DbErr> {
        transactions::Entity::find_by_id(id)
            .filter(transactions::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
    }

    /// Lists transactions matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<PageResponse<transactions::Model>, DbErr> {
        let mut query = transactions::Entity::find();

        if let Some(user_id) = filter.user_id {
            query = query.filter(transactions::Column::UserId.eq(user_id));
        }

        if let Some(status) = filter.status {
            query = query.filter(transactions::Column::Status.eq(TransactionStatus::from(status)));
        }

        if let Some(kind) = filter.kind {
            query = query
                .filter(transactions::Column::TransactionType.eq(TransactionType::from(kind)));
        }

        if let Some(from) = filter.from {
            query = query.filter(transactions::Column::CreatedAt.gte(from));
        }

        if let Some(to) = filter.to {
            query = query.filter(transactions::Column::CreatedAt.lte(to));
        }

        if let Some(term) = filter.search_term() {
            let pattern = format!("%{term}%");
            query = query.filter(
                Condition::any()
                    .add(Expr::col(transactions::Column::Reference).ilike(pattern.clone()))
                    .add(Expr::cust_with_values("metadata::text ILIKE $1", [pattern])),
            );
        }

        let total = query.clone().count(&self.db).await?;
        let items = query
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.db)
            .await?;

        Ok(PageResponse::new(items, page, total))
    }

    /// Returns true if the user has a completed transaction of `kind` other
    /// than `excluding`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn has_completed_in<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        kind: CoreType,
        excluding: Uuid,
    ) -> Result<bool, DbErr> {
        let count = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::TransactionType.eq(TransactionType::from(kind)))
            .filter(transactions::Column::Status.eq(TransactionStatus::Completed))
            .filter(transactions::Column::Id.ne(excluding))
            .count(conn)
            .await?;

        Ok(count > 0)
    }

    /// Lists pending gateway-collected transactions created before `older_than`,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<transactions::Model>, DbErr> {
        transactions::Entity::find()
            .filter(transactions::Column::Status.eq(TransactionStatus::Pending))
            .filter(transactions::Column::Reference.is_not_null())
            .filter(transactions::Column::TransactionType.is_in([
                TransactionType::Deposit,
                TransactionType::Subscription,
            ]))
            .filter(transactions::Column::CreatedAt.lt(older_than))
            .order_by_asc(transactions::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
    }
}

fn is_empty(metadata: &Value) -> bool {
    match metadata {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
