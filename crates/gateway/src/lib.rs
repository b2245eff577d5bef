//! Paystack adapter for the Cambio payment gateway contract.
//!
//! - `client` - [`PaystackClient`], an implementation of `PaymentGateway`
//! - `models` - Paystack request and response bodies
//! - `webhook` - Webhook signature verification and event parsing

pub mod client;
pub mod models;
pub mod webhook;

pub use client::PaystackClient;
pub use webhook::{SIGNATURE_HEADER, WebhookEvent, sign, verify_signature};
