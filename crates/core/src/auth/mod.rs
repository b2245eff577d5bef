//! Authentication, roles, and access policy.
//!
//! This module provides:
//! - Account password hashing and login checks with Argon2id
//! - User role definitions
//! - The central action × role policy table

mod password;
pub mod policy;

pub use password::{PasswordError, hash_password, reject_unknown_account, verify_password};
pub use policy::{Action, Policy};

use serde::{Deserialize, Serialize};

/// Platform-wide user roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Unrestricted, the only role that can change other users' roles.
    SuperAdmin,
    /// Full administrative access except role changes.
    Admin,
    /// Content moderation, read access to users.
    Moderator,
    /// Manages coupons, plans, rates, and wallets.
    Manager,
    /// Read-only support access.
    Support,
    /// Regular customer.
    User,
}

impl UserRole {
    /// Every role, most privileged first.
    pub const ALL: [Self; 6] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::Moderator,
        Self::Manager,
        Self::Support,
        Self::User,
    ];

    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Manager => "manager",
            Self::Support => "support",
            Self::User => "user",
        }
    }

    /// Returns true for any role other than a regular user.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        !matches!(self, Self::User)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {s}"))
    }
}
