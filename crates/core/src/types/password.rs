//! Password strength policy.

use thiserror::Error;

use crate::validation::is_clean;

/// Minimum password length in characters.
pub const MIN_LENGTH: usize = 6;

/// Maximum password length in characters.
pub const MAX_LENGTH: usize = 30;

const SYMBOLS: &str = "!\"#$%&'()*+,-./:;<=>?@[]^_`{|}~";

/// Reasons a candidate password is rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordError {
    /// Shorter than [`MIN_LENGTH`] or longer than [`MAX_LENGTH`].
    #[error("password must be {MIN_LENGTH}-{MAX_LENGTH} characters")]
    Length,
    /// Missing a digit, a lowercase letter or an uppercase letter.
    #[error("password must contain a digit, a lowercase letter and an uppercase letter")]
    TooWeak,
    /// Contains whitespace, a backslash, non-ASCII or markup.
    #[error("password contains invalid characters")]
    InvalidCharacters,
    /// Identical to the account email.
    #[error("password cannot be the same as the email")]
    SameAsEmail,
}

/// Check `password` against the account password policy.
///
/// `email` is the address of the account the password is for; a password
/// identical to it is rejected.
///
/// # Errors
///
/// Returns the first [`PasswordError`] the password violates.
///
/// # Examples
///
/// ```
/// use secure_commerce_core::{PasswordError, validate_password};
///
/// assert!(validate_password("Passw0rd!", "a@b.com").is_ok());
/// assert_eq!(validate_password("password", "a@b.com"), Err(PasswordError::TooWeak));
/// ```
pub fn validate_password(password: &str, email: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&len) {
        return Err(PasswordError::Length);
    }

    if !password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SYMBOLS.contains(c))
    {
        return Err(PasswordError::InvalidCharacters);
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    if !(has_digit && has_lower && has_upper) {
        return Err(PasswordError::TooWeak);
    }

    if !is_clean(password) {
        return Err(PasswordError::InvalidCharacters);
    }

    if password == email {
        return Err(PasswordError::SameAsEmail);
    }

    Ok(())
}
