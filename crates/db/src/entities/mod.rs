//! `SeaORM` entities.

pub mod coupon_redemptions;
pub mod coupons;
pub mod exchange_rates;
pub mod plans;
pub mod referrals;
pub mod sea_orm_active_enums;
pub mod transactions;
pub mod user_plans;
pub mod users;
