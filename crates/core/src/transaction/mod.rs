//! Wallet transaction records.
//!
//! A transaction is created `pending` when an operation starts and is moved
//! exactly once into a final status by whichever confirmation path wins.
//!
//! # Modules
//!
//! - `types` - Transaction kinds, statuses, outcomes, and list filters
//! - `error` - Transaction-specific error types
//! - `lifecycle` - Creation checks and the pending → final transition

pub mod error;
pub mod lifecycle;
pub mod types;

#[cfg(test)]
mod lifecycle_props;

pub use error::TransactionError;
pub use lifecycle::TransactionLifecycle;
pub use types::{DateFilter, Outcome, TransactionFilter, TransactionStatus, TransactionType};
