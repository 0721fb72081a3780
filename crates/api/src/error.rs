//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error response has the body `{"detail": "<message>"}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::ServiceError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// A service rejected the request or failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The request body was not the JSON the endpoint expects, or a required
    /// field was missing.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The caller's role may not use this endpoint.
    #[error("Permission denied.")]
    Forbidden,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::Service(ServiceError::Auth(err))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Service(ServiceError::Repository(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        Self::BadRequest("Malformed request body.".to_owned())
    }
}

impl AppError {
    /// Shorthand for a 400 with `message`.
    pub fn bad_request(message: &str) -> Self {
        Self::BadRequest(message.to_owned())
    }

    const fn is_server_error(&self) -> bool {
        match self {
            Self::Service(err) => matches!(
                err,
                ServiceError::Failed { .. }
                    | ServiceError::Repository(_)
                    | ServiceError::Internal(_)
                    | ServiceError::Auth(
                        AuthError::Encoding(_) | AuthError::Repository(_) | AuthError::PasswordHash
                    )
            ),
            Self::BadRequest(_) | Self::Forbidden => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Service(err) => match err {
                ServiceError::BadRequest(_) | ServiceError::VerificationFailed => {
                    StatusCode::BAD_REQUEST
                }
                ServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::PermissionDenied => StatusCode::FORBIDDEN,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Auth(
                    AuthError::InvalidCredentials
                    | AuthError::MissingToken
                    | AuthError::InvalidToken
                    | AuthError::TokenRevoked,
                ) => StatusCode::UNAUTHORIZED,
                ServiceError::Auth(_)
                | ServiceError::Failed { .. }
                | ServiceError::Repository(_)
                | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::Forbidden | Self::Service(ServiceError::PermissionDenied) => {
                "Permission denied.".to_owned()
            }
            Self::Service(err) => match err {
                ServiceError::BadRequest(message)
                | ServiceError::Invalid(message)
                | ServiceError::NotFound(message) => message.clone(),
                ServiceError::VerificationFailed => "OTP verification failed.".to_owned(),
                ServiceError::Failed { message, .. } => (*message).to_owned(),
                ServiceError::Auth(AuthError::InvalidCredentials) => {
                    "Invalid credentials.".to_owned()
                }
                ServiceError::Auth(AuthError::MissingToken) => {
                    "Authentication credentials were not provided.".to_owned()
                }
                ServiceError::Auth(AuthError::InvalidToken | AuthError::TokenRevoked) => {
                    "Token is invalid or expired.".to_owned()
                }
                // Don't expose internal error details to clients
                _ => "Internal server error.".to_owned(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an account ID.
///
/// Called once a bearer token has been verified, so errors are associated
/// with the account that hit them.
pub fn set_sentry_user(account_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            ..Default::default()
        }));
    });
}
