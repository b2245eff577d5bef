//! Subscription plans, activation, and referral rewards.
//!
//! # Modules
//!
//! - `types` - Plan and subscription statuses, plan terms
//! - `error` - Subscription error types
//! - `service` - Charges, activation windows, cancellation
//! - `referral` - Referral codes and commission

pub mod error;
pub mod referral;
pub mod service;
pub mod types;

pub use error::SubscriptionError;
pub use referral::{ReferralStatus, generate_referral_code, referral_commission};
pub use service::SubscriptionService;
pub use types::{PlanStatus, PlanTerms, UserPlanStatus};
