//! Business logic, independent of HTTP.
//!
//! Each service borrows what it needs from [`AppState`](crate::state::AppState)
//! for the length of one request and reports failures as [`ServiceError`],
//! whose variants map one-to-one onto response status codes.
//!
//! # Services
//!
//! - [`accounts`] - Signup, sign-in, token refresh and sign-out
//! - [`otp`] - Password reset codes
//! - [`listings`] - Seller listings
//! - [`orders`] - Order placement
//! - [`feedback`] - Feedback messages
//!
//! # Collaborators
//!
//! - [`auth`] - Password hashing and bearer tokens
//! - [`notifications`] - Background email delivery
//! - [`image_probe`] - Image URL liveness checks
//! - [`clock`] - Injected time source

pub mod accounts;
pub mod auth;
pub mod clock;
pub mod feedback;
pub mod image_probe;
pub mod listings;
pub mod notifications;
pub mod orders;
pub mod otp;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::db::RepositoryError;
use auth::AuthError;

/// Errors returned by the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required field was absent, or a token in the body was unusable.
    #[error("{0}")]
    BadRequest(String),

    /// A field was present but out of policy.
    #[error("{0}")]
    Invalid(String),

    /// The caller's role or ownership does not allow the operation.
    #[error("Permission denied.")]
    PermissionDenied,

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A password reset code did not check out, for whatever reason.
    #[error("OTP verification failed.")]
    VerificationFailed,

    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An operation failed server-side. `message` is safe to show the client.
    #[error("{message}")]
    Failed {
        message: &'static str,
        #[source]
        source: RepositoryError,
    },

    /// Unexpected repository error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Any other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub(crate) fn bad_request(message: &str) -> Self {
        Self::BadRequest(message.to_owned())
    }

    pub(crate) fn invalid(message: &str) -> Self {
        Self::Invalid(message.to_owned())
    }

    pub(crate) fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_owned())
    }

    /// Wrap a repository error with a client-facing message.
    pub(crate) fn failed(message: &'static str) -> impl Fn(RepositoryError) -> Self {
        move |source| Self::Failed { message, source }
    }
}
