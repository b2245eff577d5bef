//! HTTP error responses.
//!
//! Every failure leaves the API as `{"error": <code>, "message": <text>}`.
//! Domain errors convert into [`ApiError`] so handlers can use `?`; internal
//! failures are logged here and reach the client only as a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde_json::json;
use tracing::{error, warn};
use validator::ValidationErrors;

use cambio_core::auth::PasswordError;
use cambio_core::coupon::CouponError;
use cambio_core::exchange::ExchangeError;
use cambio_core::gateway::GatewayError;
use cambio_core::subscription::SubscriptionError;
use cambio_core::transaction::TransactionError;
use cambio_core::wallet::WalletError;
use cambio_db::repositories::{
    CouponRepoError, ExchangeRateError, PlanRepoError, TransactionRepoError, WalletRepoError,
};
use cambio_shared::{AppError, JwtError};

/// An error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error with an explicit status and code.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 400 `validation_error`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    /// 404 `not_found`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 403 `forbidden`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// 409 `conflict`.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// 401 with a specific code.
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    /// Logs `err` and returns a 500 that hides it.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        error!(error = %err, "{context}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "An internal error occurred",
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code of this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message
            })),
        )
            .into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if e.is_internal() {
            return Self::internal("Request failed", e);
        }
        let message = match &e {
            AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Validation(m)
            | AppError::BusinessRule(m)
            | AppError::Conflict(m)
            | AppError::InsufficientFunds(m)
            | AppError::InvalidCoupon(m)
            | AppError::InvalidState(m)
            | AppError::GatewayRejected(m)
            | AppError::GatewayUnavailable(m)
            | AppError::Database(m)
            | AppError::Internal(m) => m.clone(),
        };
        Self::new(status, e.error_code(), message)
    }
}

impl From<DbErr> for ApiError {
    fn from(e: DbErr) -> Self {
        Self::internal("Database error", e)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        Self::internal("Password hashing failed", e)
    }
}

impl From<JwtError> for ApiError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::EncodingError(_) => Self::internal("Token generation failed", e),
            JwtError::Expired => Self::unauthorized("token_expired", "Token has expired"),
            JwtError::DecodingError(_) | JwtError::WrongKind { .. } => {
                Self::unauthorized("invalid_token", "Invalid or malformed token")
            }
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientFunds { .. } => {
                AppError::InsufficientFunds(e.to_string()).into()
            }
            WalletError::InvalidAmount(_)
            | WalletError::TooPrecise(_)
            | WalletError::ZeroDelta
            | WalletError::NegativeBalance(_) => Self::validation(e.to_string()),
            WalletError::UserNotFound(_) => Self::not_found(e.to_string()),
        }
    }
}

impl From<WalletRepoError> for ApiError {
    fn from(e: WalletRepoError) -> Self {
        match e {
            WalletRepoError::Wallet(e) => e.into(),
            WalletRepoError::Database(e) => e.into(),
        }
    }
}

impl From<TransactionError> for ApiError {
    fn from(e: TransactionError) -> Self {
        match e {
            TransactionError::InvalidState { .. } | TransactionError::NotPending(_) => {
                warn!(error = %e, "Transaction is no longer pending");
                AppError::InvalidState(e.to_string()).into()
            }
            TransactionError::InvalidAmount(_)
            | TransactionError::TooPrecise(_)
            | TransactionError::InvalidCurrency(_) => Self::validation(e.to_string()),
            TransactionError::NotFound(_) => Self::not_found(e.to_string()),
        }
    }
}

impl From<TransactionRepoError> for ApiError {
    fn from(e: TransactionRepoError) -> Self {
        match e {
            TransactionRepoError::Transaction(e) => e.into(),
            TransactionRepoError::Database(e) => e.into(),
        }
    }
}

impl From<CouponError> for ApiError {
    fn from(e: CouponError) -> Self {
        let status = match e {
            CouponError::NotFound(_) => StatusCode::NOT_FOUND,
            CouponError::InvalidAmount(_) | CouponError::InvalidDefinition(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, e.error_code(), e.to_string())
    }
}

impl From<CouponRepoError> for ApiError {
    fn from(e: CouponRepoError) -> Self {
        match e {
            CouponRepoError::Coupon(e) => e.into(),
            CouponRepoError::DuplicateCode(_) => Self::conflict(e.to_string()),
            CouponRepoError::Database(e) => e.into(),
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(e: SubscriptionError) -> Self {
        match e {
            SubscriptionError::PlanNotActive | SubscriptionError::NotCancellable(_) => {
                AppError::BusinessRule(e.to_string()).into()
            }
            SubscriptionError::NoActiveSubscription => Self::not_found(e.to_string()),
            SubscriptionError::InvalidPlan(_) | SubscriptionError::InvalidCommissionRate(_) => {
                Self::validation(e.to_string())
            }
        }
    }
}

impl From<PlanRepoError> for ApiError {
    fn from(e: PlanRepoError) -> Self {
        match e {
            PlanRepoError::Subscription(e) => e.into(),
            PlanRepoError::NotFound(_) => Self::not_found(e.to_string()),
            PlanRepoError::DuplicateName(_) => Self::conflict(e.to_string()),
            PlanRepoError::Database(e) => e.into(),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::RateUnavailable { .. } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "rate_unavailable",
                e.to_string(),
            ),
            ExchangeError::SameCurrency(_)
            | ExchangeError::InvalidAmount(_)
            | ExchangeError::TooPrecise(_)
            | ExchangeError::InvalidRate(_) => Self::validation(e.to_string()),
        }
    }
}

impl From<ExchangeRateError> for ApiError {
    fn from(e: ExchangeRateError) -> Self {
        match e {
            ExchangeRateError::Exchange(e) => e.into(),
            ExchangeRateError::Database(e) => e.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Rejected(message) => AppError::GatewayRejected(message).into(),
            GatewayError::Unavailable(message) => {
                warn!(%message, "Payment gateway unavailable");
                AppError::GatewayUnavailable(
                    "Payment provider is unavailable, please try again later".into(),
                )
                .into()
            }
        }
    }
}
