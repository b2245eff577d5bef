//! Account passwords.
//!
//! Stored as Argon2id PHC strings in `users.password_hash`. Login also runs a
//! verification when the identifier matches no account, so a wrong email and
//! a wrong password cost the caller the same time.

use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Password storage failures. A wrong password is not one of them.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Argon2 could not produce a hash.
    #[error("could not hash password: {0}")]
    Hash(String),

    /// Argon2 failed while comparing.
    #[error("could not verify password: {0}")]
    Verify(String),

    /// The stored value is not a PHC string, e.g. a row imported in plain text.
    #[error("stored password hash is malformed")]
    MalformedHash,
}

// Hash of a throwaway secret, used when no account matched.
static UNKNOWN_ACCOUNT_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("cambio-no-such-account").ok());

/// Hashes an account password for storage.
///
/// # Errors
///
/// Returns `PasswordError::Hash` if Argon2 fails.
///
/// # Example
///
/// ```
/// use cambio_core::auth::hash_password;
///
/// let hash = hash_password("wallet-pass-2024").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Checks a login attempt against the stored hash.
///
/// # Errors
///
/// Returns `PasswordError::MalformedHash` for an unparseable stored value.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Verify(e.to_string())),
    }
}

/// Spends one verification for a login whose identifier matched no account.
pub fn reject_unknown_account(password: &str) {
    if let Some(hash) = UNKNOWN_ACCOUNT_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_registration_gets_its_own_salt() {
        let first = hash_password("naira-and-kobo").unwrap();
        let second = hash_password("naira-and-kobo").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_login_accepts_only_registered_password() {
        let stored = hash_password("correct horse battery").unwrap();

        assert!(verify_password("correct horse battery", &stored).unwrap());
        assert!(!verify_password("correct horse", &stored).unwrap());
        assert!(!verify_password("", &stored).unwrap());
    }

    #[test]
    fn test_plaintext_row_is_malformed() {
        let result = verify_password("admin123", "admin123");
        assert!(matches!(result, Err(PasswordError::MalformedHash)));
    }

    #[test]
    fn test_unknown_account_hash_is_usable() {
        let hash = UNKNOWN_ACCOUNT_HASH.as_deref().unwrap();
        assert!(!verify_password("correct horse battery", hash).unwrap());
        reject_unknown_account("correct horse battery");
    }
}
