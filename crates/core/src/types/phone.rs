//! Canadian contact phone numbers.

use core::fmt;

use phonenumber::country::Id;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneError {
    /// Not exactly ten ASCII digits.
    #[error("contact number must be 10 digits")]
    InvalidFormat,
    /// Well-formed but not an assigned Canadian number.
    #[error("contact number is not a valid Canadian number")]
    NotCanadian,
}

/// A phone number valid for Canada, stored in E.164 form (`+16139954422`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse ten national digits.
    ///
    /// The number is checked against Canadian numbering metadata, so a
    /// well-formed US number is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError::InvalidFormat`] unless the input is ten digits,
    /// and [`PhoneError::NotCanadian`] when the number is not valid for Canada.
    pub fn parse(digits: &str) -> Result<Self, PhoneError> {
        let digits = digits.trim();
        if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::InvalidFormat);
        }

        let number = phonenumber::parse(Some(Id::CA), format!("+1{digits}"))
            .map_err(|_| PhoneError::NotCanadian)?;
        if !phonenumber::is_valid(&number) || number.country().id() != Some(Id::CA) {
            return Err(PhoneError::NotCanadian);
        }

        Ok(Self(
            number.format().mode(phonenumber::Mode::E164).to_string(),
        ))
    }

    /// Wrap a value read back from storage without re-validating it.
    #[must_use]
    pub const fn from_trusted(e164: String) -> Self {
        Self(e164)
    }

    /// The number in E.164 form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
