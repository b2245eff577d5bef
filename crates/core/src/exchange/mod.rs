//! Currency exchange.
//!
//! Rates are published by administrators, cached in a [`RateCache`] owned by
//! the application state, and broadcast to live subscribers.

pub mod cache;
pub mod error;
pub mod service;
pub mod types;

pub use cache::RateCache;
pub use error::ExchangeError;
pub use service::ExchangeService;
pub use types::{ExchangeQuote, ExchangeRate};
