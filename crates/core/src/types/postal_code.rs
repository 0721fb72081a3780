//! Canadian postal codes.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static POSTAL_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]\d[A-Za-z][ -]?\d[A-Za-z]\d$").expect("postal code pattern is valid")
});

/// Error returned for input that is not a Canadian postal code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("postal code must look like A1A 1A1")]
pub struct PostalCodeError;

/// A Canadian postal code, stored uppercase without a separator (`K1A0B1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostalCode(String);

impl PostalCode {
    /// Parse `A1A 1A1`, `a1a1a1` or `A1A-1A1`. Spaces anywhere are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PostalCodeError`] if the input does not match the pattern.
    pub fn parse(input: &str) -> Result<Self, PostalCodeError> {
        let compact: String = input.chars().filter(|c| *c != ' ').collect();
        if !POSTAL_CODE_PATTERN.is_match(&compact) {
            return Err(PostalCodeError);
        }
        Ok(Self(
            compact
                .chars()
                .filter(|c| *c != '-')
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        ))
    }

    /// Wrap a value read back from storage without re-validating it.
    #[must_use]
    pub const fn from_trusted(code: String) -> Self {
        Self(code)
    }

    /// The canonical six-character form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.0.get(..3), self.0.get(3..)) {
            (Some(fsa), Some(ldu)) if !ldu.is_empty() => write!(f, "{fsa} {ldu}"),
            _ => f.write_str(&self.0),
        }
    }
}
