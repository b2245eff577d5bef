//! Unit tests for JWT functionality.

use crate::auth::TokenKind;
use crate::config::JwtSettings;
use crate::jwt::{JwtConfig, JwtError, JwtService};
use uuid::Uuid;

fn create_test_service() -> JwtService {
    JwtService::new(JwtConfig {
        secret: "test-secret-key-for-testing".to_string(),
        access_token_expires_minutes: 15,
        refresh_token_expires_days: 7,
    })
}

#[test]
fn test_access_token_round_trip() {
    let service = create_test_service();
    let user_id = Uuid::new_v4();

    let token = service.generate_access_token(user_id, "admin").unwrap();
    let claims = service.validate_kind(&token, TokenKind::Access).unwrap();

    assert_eq!(claims.user_id(), user_id);
    assert_eq!(claims.role, "admin");
    assert_eq!(claims.exp - claims.iat, 15 * 60);
}

#[test]
fn test_refresh_token_is_not_an_access_token() {
    let service = create_test_service();
    let pair = service.generate_pair(Uuid::new_v4(), "user").unwrap();

    assert!(service.validate_kind(&pair.refresh_token, TokenKind::Refresh).is_ok());
    assert!(matches!(
        service.validate_kind(&pair.refresh_token, TokenKind::Access),
        Err(JwtError::WrongKind {
            expected: TokenKind::Access
        })
    ));
    assert_eq!(pair.expires_in, 900);
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let service = create_test_service();
    let other = JwtService::new(JwtConfig {
        secret: "another-secret".to_string(),
        ..JwtConfig::default()
    });

    let token = other.generate_access_token(Uuid::new_v4(), "user").unwrap();
    assert!(matches!(
        service.validate_token(&token),
        Err(JwtError::DecodingError(_))
    ));
}

#[test]
fn test_invalid_token() {
    let service = create_test_service();
    assert!(service.validate_token("invalid.token.here").is_err());
}

#[test]
fn test_config_from_settings() {
    let config = JwtConfig::from(&JwtSettings {
        secret: "s".to_string(),
        access_token_expiry_secs: 1800,
        refresh_token_expiry_secs: 172_800,
    });
    assert_eq!(config.access_token_expires_minutes, 30);
    assert_eq!(config.refresh_token_expires_days, 2);
}
