//! Account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use secure_commerce_core::{AccountId, Email, PhoneNumber, Role};

/// A registered account.
///
/// `Debug` is implemented manually so the password hash never reaches logs.
#[derive(Clone)]
pub struct Account {
    /// Unique account ID.
    pub id: AccountId,
    /// Sign-in email, unique across accounts.
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// What the account may do. Fixed at creation.
    pub role: Role,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact phone number, if provided.
    pub contact_number: Option<PhoneNumber>,
    /// Postal address, if provided.
    pub address: Option<String>,
    /// Inactive accounts cannot sign in.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Fields needed to create an account.
#[derive(Clone)]
pub struct NewAccount {
    /// Sign-in email.
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Role chosen at signup.
    pub role: Role,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// The user record returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: AccountId,
    pub email: Email,
    pub user_type: Role,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: Option<PhoneNumber>,
    pub address: Option<String>,
}

impl From<&Account> for UserRecord {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            user_type: account.role,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            contact_number: account.contact_number.clone(),
            address: account.address.clone(),
        }
    }
}
