//! Revoked token maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Forget revoked token ids whose tokens have expired anyway
//! sc-cli tokens prune
//! ```

use chrono::Utc;

use secure_commerce_api::db::{PgStore, RepositoryError, TokenBlacklist};

use super::{ConnectError, connect};

/// Errors that can occur while pruning.
#[derive(Debug, thiserror::Error)]
pub enum TokensError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Delete blacklist rows for tokens past their own expiry.
///
/// Returns the number of rows removed.
pub async fn prune() -> Result<u64, TokensError> {
    let store = PgStore::new(connect().await?);

    let now = Utc::now();
    let removed = store.prune_expired(now).await?;

    tracing::info!(removed, "Pruned expired revoked tokens");
    Ok(removed)
}
