//! CLI command implementations.

pub mod admin;
pub mod migrate;
pub mod otp;
pub mod tokens;

use secrecy::SecretString;
use sqlx::PgPool;

use secure_commerce_api::db;

/// Errors shared by every command that talks to the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Neither `SHOP_DATABASE_URL` nor `DATABASE_URL` is set.
    #[error("Missing environment variable: SHOP_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    /// Could not connect.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the database named by `SHOP_DATABASE_URL` or `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, ConnectError> {
    let database_url = std::env::var("SHOP_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| ConnectError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&SecretString::from(database_url)).await?)
}
