//! Admin account management commands.
//!
//! Admins cannot sign up through the API; this is the only way to create one.
//!
//! # Usage
//!
//! ```bash
//! SC_ADMIN_PASSWORD='Adm1n!pass' sc-cli admin create -e admin@example.com -f Ada -l Lovelace
//! ```
//!
//! # Environment Variables
//!
//! - `SHOP_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `SC_ADMIN_PASSWORD` - Password for the new account, if `--password` is not given

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use secure_commerce_api::db::{AccountRepository, PgStore, RepositoryError};
use secure_commerce_api::models::NewAccount;
use secure_commerce_api::services::auth::{AuthError, hash_password};
use secure_commerce_core::{AccountId, Email, PasswordError, Role, TextError, clean_text, validate_password};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password fails the password policy.
    #[error("Invalid password: {0}")]
    InvalidPassword(#[from] PasswordError),

    /// First or last name out of policy.
    #[error("Invalid name: {0}")]
    InvalidName(#[from] TextError),

    /// User already exists.
    #[error("Account already exists with email: {0}")]
    UserExists(String),

    #[error("Could not hash password: {0}")]
    Hash(#[from] AuthError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create an admin account.
///
/// # Arguments
///
/// * `email` - Sign-in email
/// * `first_name`, `last_name` - 2-40 characters each
/// * `password` - Must satisfy the same policy as customer passwords
///
/// # Returns
///
/// The ID of the created account.
pub async fn create_user(
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &SecretString,
) -> Result<AccountId, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    validate_password(password.expose_secret(), email.as_str())?;
    let first_name = clean_text(first_name, 2, 40, "first name")?;
    let last_name = clean_text(last_name, 2, 40, "last name")?;

    let store = PgStore::new(connect().await?);
    if store.exists(&email).await? {
        return Err(AdminError::UserExists(email.into_inner()));
    }

    tracing::info!("Creating admin account: {}", email);
    let account = store
        .create(NewAccount {
            email: email.clone(),
            password_hash: hash_password(password.expose_secret())?,
            role: Role::Admin,
            first_name,
            last_name,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.as_str().to_owned()),
            other => other.into(),
        })?;

    tracing::info!(
        "Admin account created successfully! ID: {}, Email: {}",
        account.id,
        account.email
    );
    Ok(account.id)
}
