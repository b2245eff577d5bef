//! Authentication middleware for protected routes.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde_json::json;

use crate::{AppState, error::ApiError};
use cambio_core::auth::{Action, Policy, UserRole};
use cambio_shared::{Claims, JwtError, TokenKind};

/// Authentication middleware that validates JWT access tokens.
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Validates it as an access token (refresh tokens are refused)
/// 3. Stores the claims in request extensions for handlers to access
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>()
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "missing_token",
                "message": "Authorization header with Bearer token is required"
            })),
        )
            .into_response();
    };

    match state
        .jwt_service
        .validate_kind(bearer.token(), TokenKind::Access)
    {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            let (error, message) = match e {
                JwtError::Expired => ("token_expired", "Token has expired"),
                _ => ("invalid_token", "Invalid or malformed token"),
            };

            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": error, "message": message })),
            )
                .into_response()
        }
    }
}

/// Extractor for authenticated user claims.
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     let user_id = auth.user_id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the user ID from the claims.
    #[must_use]
    pub fn user_id(&self) -> uuid::Uuid {
        self.0.user_id()
    }

    /// Returns the user's role. Unknown role strings are treated as `user`.
    #[must_use]
    pub fn role(&self) -> UserRole {
        self.0.role.parse().unwrap_or(UserRole::User)
    }

    /// Returns the inner claims.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.0
    }

    /// Fails with 403 unless the policy lets this user perform `action`.
    pub fn require(&self, action: Action) -> Result<(), ApiError> {
        if Policy::allows(self.role(), action) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id(), role = %self.role(), %action, "Access denied");
            Err(ApiError::forbidden(format!(
                "Your role is not allowed to {}",
                action.to_string().replace('_', " ")
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "unauthorized",
                        "message": "Authentication required"
                    })),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn auth(role: &str) -> AuthUser {
        AuthUser(Claims::new(
            Uuid::new_v4(),
            role,
            TokenKind::Access,
            Utc::now() + Duration::minutes(15),
        ))
    }

    #[test]
    fn test_require_follows_policy() {
        assert!(auth("manager").require(Action::AdjustWallet).is_ok());
        let denied = auth("support").require(Action::AdjustWallet).unwrap_err();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(denied.code(), "forbidden");
    }

    #[test]
    fn test_unknown_role_is_plain_user() {
        assert_eq!(auth("owner").role(), UserRole::User);
        assert!(auth("owner").require(Action::ViewUsers).is_err());
    }
}
