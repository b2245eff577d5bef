//! Coupon validation and discount calculation.
//!
//! # Modules
//!
//! - `types` - Coupon kinds, the rule snapshot, and the computed discount
//! - `error` - Rejection reasons
//! - `service` - Validation order and discount arithmetic

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::CouponError;
pub use service::CouponService;
pub use types::{CouponRules, CouponStatus, CouponType, Discount};
