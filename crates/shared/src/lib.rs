//! Shared types, errors, and configuration for Cambio.
//!
//! This crate provides common types used across all other crates:
//! - Money types with decimal precision and minor-unit conversion
//! - Limit/offset pagination for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT issuing and validation

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

#[cfg(test)]
mod jwt_tests;

pub use auth::{Claims, TokenKind, TokenPair};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
