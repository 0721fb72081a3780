//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, unknown email, or inactive account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No bearer token on a request that needs one.
    #[error("authentication credentials were not provided")]
    MissingToken,

    /// Token is malformed, badly signed, expired, or of the wrong kind.
    #[error("token is invalid or expired")]
    InvalidToken,

    /// Token was revoked at sign-out.
    #[error("token has been revoked")]
    TokenRevoked,

    /// Token signing failed.
    #[error("token encoding error: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
