//! Storage interfaces and their implementations.
//!
//! Handlers never touch a database directly. Each table is reached through a
//! repository trait, and [`Repositories`] bundles one implementation of each so
//! the same services run against `PostgreSQL` in production and against
//! [`MemoryStore`] in tests.
//!
//! ## Tables
//!
//! - `accounts` - Sign-in identity, role, contact details
//! - `otps` - Password reset codes
//! - `listings` - Seller product offerings
//! - `orders` / `order_items` - Purchases and their lines
//! - `feedback` - Messages left by signed-in accounts
//! - `revoked_tokens` - Signed-out token ids
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p secure-commerce-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use secure_commerce_core::{AccountId, Email, ListingId, OrderId, OtpCode, OtpId};

use crate::models::{
    Account, Feedback, Listing, NewAccount, NewListing, NewOrder, NewOrderItem, Order, OrderItem,
    Otp,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Account storage.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Look up an account by sign-in email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError>;

    /// Look up an account by ID.
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError>;

    /// Whether an account with this email exists.
    async fn exists(&self, email: &Email) -> Result<bool, RepositoryError>;

    /// Create an account.
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError>;
}

/// Password reset code storage.
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Delete every code for the account and store a fresh one, atomically.
    async fn replace_for_account(
        &self,
        account_id: AccountId,
        code: OtpCode,
        created_at: DateTime<Utc>,
    ) -> Result<Otp, RepositoryError>;

    /// The newest code issued to the account, if any.
    async fn find_for_account(&self, account_id: AccountId)
    -> Result<Option<Otp>, RepositoryError>;

    /// Flip the code's `used` flag and set the account's password hash, both
    /// or neither.
    ///
    /// Returns `false`, with nothing written, if the code was already used or
    /// no longer exists, so two concurrent redemptions cannot both succeed.
    async fn redeem(
        &self,
        id: OtpId,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<bool, RepositoryError>;

    /// Delete codes created before `before`. Returns how many were removed.
    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Listing storage.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Every listing, oldest first.
    async fn list_all(&self) -> Result<Vec<Listing>, RepositoryError>;

    /// Listings owned by one seller, oldest first.
    async fn list_by_seller(&self, seller_id: AccountId) -> Result<Vec<Listing>, RepositoryError>;

    /// Look up a listing by ID.
    async fn find_by_id(&self, id: ListingId) -> Result<Option<Listing>, RepositoryError>;

    /// Look up several listings at once. Missing IDs are simply absent from
    /// the result.
    async fn find_many(&self, ids: &[ListingId]) -> Result<Vec<Listing>, RepositoryError>;

    /// Create a listing.
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    async fn create(&self, listing: NewListing) -> Result<Listing, RepositoryError>;

    /// Delete a listing. Returns `false` if it did not exist.
    async fn delete(&self, id: ListingId) -> Result<bool, RepositoryError>;
}

/// Order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Store an order and all its lines, or nothing at all.
    ///
    /// Returns `RepositoryError::NotFound` if any line references a missing
    /// listing.
    async fn place(
        &self,
        order: NewOrder,
        items: &[NewOrderItem],
    ) -> Result<(Order, Vec<OrderItem>), RepositoryError>;

    /// An order together with its lines.
    async fn find_with_items(
        &self,
        id: OrderId,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, RepositoryError>;

    /// Total number of stored orders.
    async fn count_orders(&self) -> Result<u64, RepositoryError>;

    /// Total number of stored order lines.
    async fn count_order_items(&self) -> Result<u64, RepositoryError>;
}

/// Feedback storage.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Store a feedback message.
    async fn create(
        &self,
        account_id: AccountId,
        message: &str,
    ) -> Result<Feedback, RepositoryError>;
}

/// Revoked token ids.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Reject the token with this id until it expires on its own.
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Whether the token with this id has been revoked.
    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError>;

    /// Forget ids whose tokens expired before `before`. Returns how many were
    /// removed.
    async fn prune_expired(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Liveness of the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Round-trip to the store.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// One implementation of every repository, shared by all handlers.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub otps: Arc<dyn OtpRepository>,
    pub listings: Arc<dyn ListingRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// Repositories backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)))
    }

    /// Repositories backed by a shared [`MemoryStore`].
    #[must_use]
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self::from_store(store)
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AccountRepository
            + OtpRepository
            + ListingRepository
            + OrderRepository
            + FeedbackRepository
            + TokenBlacklist
            + StoreHealth
            + 'static,
    {
        Self {
            accounts: store.clone(),
            otps: store.clone(),
            listings: store.clone(),
            orders: store.clone(),
            feedback: store.clone(),
            blacklist: store.clone(),
            health: store,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
