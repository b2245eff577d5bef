//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod coupon;
pub mod exchange_rate;
pub mod plan;
pub mod referral;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use coupon::{CouponRepoError, CouponRepository, CreateCouponInput, UpdateCouponInput};
pub use exchange_rate::{ExchangeRateError, ExchangeRateRepository};
pub use plan::{CreatePlanInput, PlanRepoError, PlanRepository, UpdatePlanInput};
pub use referral::{ReferralRepository, ReferralWithUser};
pub use transaction::{NewTransaction, TransactionRepoError, TransactionRepository};
pub use user::{CreateUserInput, UserFilter, UserRepository};
pub use wallet::{BalanceChange, WalletRepoError, WalletRepository};
