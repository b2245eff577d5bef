//! Authentication routes.

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use sea_orm::TransactionTrait;
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use cambio_core::auth::{UserRole, hash_password, reject_unknown_account, verify_password};
use cambio_core::subscription::generate_referral_code;
use cambio_db::repositories::{CreateUserInput, ReferralRepository, UserRepository};
use cambio_shared::{
    Claims, TokenKind,
    auth::{LoginRequest, LoginResponse, RefreshRequest, RegisterRequest},
    types::Currency,
};

use crate::{AppState, dto::user_info, error::ApiError};

/// Attempts at drawing an unused referral code before giving up.
const REFERRAL_CODE_ATTEMPTS: usize = 5;

/// Creates public auth routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

/// Creates auth routes that need a signed-in user.
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

/// POST /auth/login - Authenticate with username or email.
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let user_repo = UserRepository::new((*state.db).clone());
    let Some(user) = user_repo.find_by_identifier(payload.identifier.trim()).await? else {
        reject_unknown_account(&payload.password);
        return Err(invalid_credentials());
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "Failed login attempt");
        return Err(invalid_credentials());
    }

    if !user.is_active {
        return Err(ApiError::unauthorized(
            "account_disabled",
            "This account has been disabled",
        ));
    }

    let role = UserRole::from(user.role);
    let tokens = state.jwt_service.generate_pair(user.id, role.as_str())?;

    info!(user_id = %user.id, "User logged in successfully");

    Ok(Json(LoginResponse {
        user: user_info(&user),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
    }))
}

/// POST /auth/register - Register a new user and sign them in.
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let currency = match payload.currency.as_deref() {
        Some(code) => code.parse::<Currency>().map_err(ApiError::validation)?,
        None => Currency::Ngn,
    };

    let user_repo = UserRepository::new((*state.db).clone());

    if user_repo.username_exists(&payload.username).await? {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "username_exists",
            "This username is already taken",
        ));
    }
    if user_repo.email_exists(&payload.email).await? {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "email_exists",
            "An account with this email already exists",
        ));
    }

    let referrer = match payload
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(code) => Some(
            user_repo
                .find_by_referral_code(code)
                .await?
                .ok_or_else(|| ApiError::validation("Referral code is not valid"))?,
        ),
        None => None,
    };

    let password_hash = hash_password(&payload.password)?;
    let referral_code = unused_referral_code(&user_repo).await?;

    let txn = state.db.begin().await?;
    let user = UserRepository::create_in(
        &txn,
        CreateUserInput {
            username: payload.username.trim().to_string(),
            email: payload.email.trim().to_string(),
            password_hash,
            role: UserRole::User,
            currency: currency.code().to_string(),
            referral_code,
            referred_by: referrer.as_ref().map(|r| r.id),
        },
    )
    .await?;
    if let Some(referrer) = &referrer {
        ReferralRepository::create_in(&txn, referrer.id, user.id).await?;
    }
    txn.commit().await?;

    info!(
        user_id = %user.id,
        referred_by = ?user.referred_by,
        "New user registered"
    );

    let tokens = state
        .jwt_service
        .generate_pair(user.id, UserRole::User.as_str())?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            user: user_info(&user),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        }),
    ))
}

/// POST /auth/refresh - Exchange a refresh token for a new token pair.
///
/// The role is re-read so a promotion or demotion takes effect on refresh.
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .jwt_service
        .validate_kind(&payload.refresh_token, TokenKind::Refresh)?;

    let user = UserRepository::new((*state.db).clone())
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid_token", "Invalid refresh token"))?;

    if !user.is_active {
        return Err(ApiError::unauthorized(
            "account_disabled",
            "This account has been disabled",
        ));
    }

    let tokens = state
        .jwt_service
        .generate_pair(user.id, UserRole::from(user.role).as_str())?;

    Ok(Json(json!({
        "accessToken": tokens.access_token,
        "refreshToken": tokens.refresh_token,
        "expiresIn": tokens.expires_in
    })))
}

/// GET /auth/me - The signed-in user's profile.
async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = UserRepository::new((*state.db).clone())
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user_info(&user)))
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("invalid_credentials", "Invalid username, email or password")
}

async fn unused_referral_code(user_repo: &UserRepository) -> Result<String, ApiError> {
    for _ in 0..REFERRAL_CODE_ATTEMPTS {
        let code = generate_referral_code();
        if user_repo.find_by_referral_code(&code).await?.is_none() {
            return Ok(code);
        }
    }
    Err(ApiError::internal(
        "Referral code generation failed",
        "no unused code found",
    ))
}
