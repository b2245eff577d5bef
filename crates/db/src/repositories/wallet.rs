//! Wallet repository: atomic balance mutations on the `users` table.
//!
//! Every change is one conditional `UPDATE ... WHERE wallet_balance + delta >= 0`,
//! so concurrent debits can neither lose an update nor overdraw. The
//! `chk_wallet_balance_non_negative` constraint backs this up.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect,
};
use tracing::{debug, info};
use uuid::Uuid;

use cambio_core::wallet::{AdminAdjustment, WalletError, WalletOperation, apply_delta};

use crate::entities::users;

/// Error types for wallet operations.
#[derive(Debug, thiserror::Error)]
pub enum WalletRepoError {
    /// Domain rule violation.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Balance before and after an administrative adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    /// Balance before the adjustment.
    pub previous: Decimal,
    /// Balance after the adjustment.
    pub current: Decimal,
    /// The operation applied, `None` when a `set` left the balance unchanged.
    pub operation: Option<WalletOperation>,
}

/// Wallet repository.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    db: DatabaseConnection,
}

impl WalletRepository {
    /// Creates a new wallet repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the current balance of a user.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::UserNotFound` if the user does not exist.
    pub async fn balance(&self, user_id: Uuid) -> Result<Decimal, WalletRepoError> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(WalletError::UserNotFound(user_id))?;

        Ok(user.wallet_balance)
    }

    /// Applies an operation in its own statement and returns the new balance.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_in`].
    pub async fn apply(
        &self,
        user_id: Uuid,
        operation: WalletOperation,
    ) -> Result<Decimal, WalletRepoError> {
        Self::apply_in(&self.db, user_id, operation).await
    }

    /// Applies an operation on the given connection and returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `WalletError::InvalidAmount` if the operation amounts are invalid
    /// - `WalletError::InsufficientFunds` if the debit would overdraw the wallet
    /// - `WalletError::UserNotFound` if the user does not exist
    pub async fn apply_in<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        operation: WalletOperation,
    ) -> Result<Decimal, WalletRepoError> {
        let delta = operation.delta()?;
        let balance = Self::add_delta_in(conn, user_id, delta).await?;

        info!(%user_id, ?operation, %delta, %balance, "Wallet updated");
        Ok(balance)
    }

    // Zero rows updated means either the user is missing or the balance is
    // too low; a follow-up read tells the two apart.
    async fn add_delta_in<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        delta: Decimal,
    ) -> Result<Decimal, WalletRepoError> {
        if delta.is_zero() {
            return Err(WalletError::ZeroDelta.into());
        }

        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let updated = users::Entity::update_many()
            .col_expr(
                users::Column::WalletBalance,
                Expr::col(users::Column::WalletBalance).add(delta),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::WalletBalance.gte(-delta))
            .exec_with_returning(conn)
            .await?;

        if let Some(user) = updated.into_iter().next() {
            return Ok(user.wallet_balance);
        }

        let user = users::Entity::find_by_id(user_id)
            .one(conn)
            .await?
            .ok_or(WalletError::UserNotFound(user_id))?;

        debug!(%user_id, balance = %user.wallet_balance, %delta, "Wallet debit refused");
        // A concurrent credit can land between the refused update and this
        // read; the update's decision stands either way.
        let refusal = apply_delta(user.wallet_balance, delta).err().unwrap_or(
            WalletError::InsufficientFunds {
                balance: user.wallet_balance,
                required: -delta,
            },
        );
        Err(refusal.into())
    }

    /// Locks the user's row for the rest of the transaction and returns its balance.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::UserNotFound` if the user does not exist.
    pub async fn lock_balance_in<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
    ) -> Result<Decimal, WalletRepoError> {
        let user = users::Entity::find_by_id(user_id)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or(WalletError::UserNotFound(user_id))?;

        Ok(user.wallet_balance)
    }

    /// Applies an administrative adjustment under a row lock.
    ///
    /// `set` is resolved against the locked balance, so it cannot race with a
    /// concurrent credit or debit.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `WalletError::InvalidAmount` for non-positive add/subtract amounts
    /// - `WalletError::NegativeBalance` for a negative `set` target
    /// - `WalletError::InsufficientFunds` if `subtract` would overdraw
    /// - `WalletError::UserNotFound` if the user does not exist
    pub async fn adjust_in<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        adjustment: AdminAdjustment,
    ) -> Result<BalanceChange, WalletRepoError> {
        let previous = Self::lock_balance_in(conn, user_id).await?;

        let Some(operation) = adjustment.resolve(previous)? else {
            return Ok(BalanceChange {
                previous,
                current: previous,
                operation: None,
            });
        };

        let current = Self::apply_in(conn, user_id, operation).await?;
        Ok(BalanceChange {
            previous,
            current,
            operation: Some(operation),
        })
    }
}
