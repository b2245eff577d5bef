//! Transaction domain types.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a transaction moves money for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Gateway-funded wallet credit.
    Deposit,
    /// Wallet debit paid out to a bank account.
    Withdrawal,
    /// Wallet debit converted into another currency.
    Exchange,
    /// Wallet-to-wallet movement between users.
    Transfer,
    /// Commission credited to a referrer.
    Referral,
    /// Plan purchase. Never credits the wallet.
    Subscription,
}

impl TransactionType {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Exchange => "exchange",
            Self::Transfer => "transfer",
            Self::Referral => "referral",
            Self::Subscription => "subscription",
        }
    }

    /// Short tag used in generated gateway references.
    #[must_use]
    pub const fn reference_tag(&self) -> &'static str {
        match self {
            Self::Deposit => "dep",
            Self::Withdrawal => "wdr",
            Self::Exchange => "exc",
            Self::Transfer => "trf",
            Self::Referral => "ref",
            Self::Subscription => "sub",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction status.
///
/// Only `Pending` is non-terminal. There is no path back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting confirmation.
    Pending,
    /// Confirmed and applied.
    Completed,
    /// Rejected by the gateway or abandoned.
    Failed,
    /// Withdrawn by the user or an administrator.
    Cancelled,
}

impl TransactionStatus {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for every status other than `Pending`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final status a pending transaction is moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Moves to `Completed`.
    Completed,
    /// Moves to `Failed`.
    Failed,
    /// Moves to `Cancelled`.
    Cancelled,
}

impl Outcome {
    /// The status this outcome produces.
    #[must_use]
    pub const fn status(self) -> TransactionStatus {
        match self {
            Self::Completed => TransactionStatus::Completed,
            Self::Failed => TransactionStatus::Failed,
            Self::Cancelled => TransactionStatus::Cancelled,
        }
    }
}

/// Named date windows accepted by the transaction listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFilter {
    /// Since midnight UTC today.
    Today,
    /// The last 7 days.
    Week,
    /// The last calendar month.
    Month,
    /// The last 12 months.
    Year,
}

impl DateFilter {
    /// Lower bound of the window ending at `now`.
    #[must_use]
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => Utc
                .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
                .single()
                .unwrap_or(now),
            Self::Week => now - Duration::days(7),
            Self::Month => now.checked_sub_months(Months::new(1)).unwrap_or(now),
            Self::Year => now.checked_sub_months(Months::new(12)).unwrap_or(now),
        }
    }
}

/// Filters for transaction listings.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to one owner.
    pub user_id: Option<Uuid>,
    /// Restrict to one status.
    pub status: Option<TransactionStatus>,
    /// Restrict to one type.
    pub kind: Option<TransactionType>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive match on reference or metadata text.
    pub search: Option<String>,
}

impl TransactionFilter {
    /// Applies a named window, leaving explicit bounds untouched when none is given.
    #[must_use]
    pub fn with_date_filter(mut self, filter: Option<DateFilter>, now: DateTime<Utc>) -> Self {
        if let Some(filter) = filter {
            self.from = Some(filter.since(now));
            self.to = None;
        }
        self
    }

    /// Returns the search term, trimmed, if non-empty.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
