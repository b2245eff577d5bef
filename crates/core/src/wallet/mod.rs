//! Wallet balance rules.
//!
//! Every balance change is expressed as a [`WalletOperation`] whose variant
//! fixes the sign of the delta. The database applies the delta with a single
//! conditional update and reports a refusal through [`apply_delta`], the same
//! rule in pure form. Amounts never go below the minor unit.

pub mod error;
pub mod operation;

#[cfg(test)]
mod operation_props;

pub use error::WalletError;
pub use operation::{AdminAdjustment, BALANCE_PLACES, WalletOperation, apply_delta};
