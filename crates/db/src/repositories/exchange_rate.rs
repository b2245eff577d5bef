//! Exchange rate repository.
//!
//! One row per currency pair, maintained by administrators. Inverse pairs
//! are derived by the rate cache rather than stored.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::info;
use uuid::Uuid;

use cambio_core::exchange::{ExchangeError, ExchangeRate};
use cambio_shared::types::Currency;

use crate::entities::exchange_rates;

/// Error types for exchange rate operations.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeRateError {
    /// Rate rule violation.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Exchange rate repository.
#[derive(Debug, Clone)]
pub struct ExchangeRateRepository {
    db: DatabaseConnection,
}

impl ExchangeRateRepository {
    /// Creates a new exchange rate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates or replaces the rate of a pair.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeError::SameCurrency` or `ExchangeError::InvalidRate`
    /// for a bad pair or rate.
    pub async fn upsert(
        &self,
        base: Currency,
        quote: Currency,
        rate: Decimal,
        updated_by: Option<Uuid>,
    ) -> Result<exchange_rates::Model, ExchangeRateError> {
        if base == quote {
            return Err(ExchangeError::SameCurrency(base).into());
        }
        if rate <= Decimal::ZERO {
            return Err(ExchangeError::InvalidRate(rate).into());
        }

        let now = Utc::now().into();
        let row = exchange_rates::ActiveModel {
            id: Set(Uuid::now_v7()),
            base_currency: Set(base.code().to_string()),
            quote_currency: Set(quote.code().to_string()),
            rate: Set(rate),
            updated_by: Set(updated_by),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let saved = exchange_rates::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    exchange_rates::Column::BaseCurrency,
                    exchange_rates::Column::QuoteCurrency,
                ])
                .update_columns([
                    exchange_rates::Column::Rate,
                    exchange_rates::Column::UpdatedBy,
                    exchange_rates::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_with_returning(&self.db)
            .await?;

        info!(%base, %quote, %rate, "Exchange rate updated");
        Ok(saved)
    }

    /// Lists all stored rates.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<exchange_rates::Model>, DbErr> {
        exchange_rates::Entity::find()
            .order_by_asc(exchange_rates::Column::BaseCurrency)
            .order_by_asc(exchange_rates::Column::QuoteCurrency)
            .all(&self.db)
            .await
    }

    /// Finds the stored rate of a pair in the given direction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_pair(
        &self,
        base: Currency,
        quote: Currency,
    ) -> Result<Option<exchange_rates::Model>, DbErr> {
        exchange_rates::Entity::find()
            .filter(exchange_rates::Column::BaseCurrency.eq(base.code()))
            .filter(exchange_rates::Column::QuoteCurrency.eq(quote.code()))
            .one(&self.db)
            .await
    }
}

/// Converts a stored row into the cached domain rate.
///
/// Returns `None` for rows with currency codes this build does not know.
#[must_use]
pub fn to_domain(row: &exchange_rates::Model) -> Option<ExchangeRate> {
    Some(ExchangeRate {
        base_currency: row.base_currency.parse().ok()?,
        quote_currency: row.quote_currency.parse().ok()?,
        rate: row.rate,
        updated_at: row.updated_at.into(),
    })
}
