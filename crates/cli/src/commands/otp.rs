//! Password reset code maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Delete codes older than the validity window
//! sc-cli otp prune
//! ```

use chrono::Utc;

use secure_commerce_api::db::{OtpRepository, PgStore, RepositoryError};
use secure_commerce_core::OTP_VALIDITY;

use super::{ConnectError, connect};

/// Errors that can occur while pruning.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Delete every code issued more than [`OTP_VALIDITY`] ago, used or not.
///
/// Returns the number of rows removed.
pub async fn prune() -> Result<u64, OtpError> {
    let store = PgStore::new(connect().await?);

    let cutoff = Utc::now() - OTP_VALIDITY;
    let removed = store.delete_expired(cutoff).await?;

    tracing::info!(removed, cutoff = %cutoff, "Pruned expired OTPs");
    Ok(removed)
}
