//! Core business logic for Cambio.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `auth` - Roles, password hashing, and the access policy table
//! - `transaction` - Transaction types and the pending → final lifecycle
//! - `wallet` - Signed wallet operations and balance arithmetic
//! - `coupon` - Coupon validation and discount calculation
//! - `subscription` - Plan charges, activation windows, referral commission
//! - `exchange` - Currency conversion, fees, and the rate cache
//! - `gateway` - Payment gateway contract
//! - `poller` - Confirmation poller state machine and registry

pub mod auth;
pub mod coupon;
pub mod exchange;
pub mod gateway;
pub mod poller;
pub mod subscription;
pub mod transaction;
pub mod wallet;
