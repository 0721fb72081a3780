//! One-time password codes and their lifecycle.

use core::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long an issued code stays usable.
pub const OTP_VALIDITY: TimeDelta = TimeDelta::minutes(10);

/// Error returned for input that is not a four-digit code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("OTP must be a 4 digit number")]
pub struct OtpCodeError;

/// A four-digit reset code in `1000..=9999`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct OtpCode(u16);

impl OtpCode {
    /// Smallest code ever issued.
    pub const MIN: u16 = 1000;
    /// Largest code ever issued.
    pub const MAX: u16 = 9999;

    /// Wrap a numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`OtpCodeError`] outside `1000..=9999`.
    pub const fn new(code: u16) -> Result<Self, OtpCodeError> {
        if code < Self::MIN || code > Self::MAX {
            return Err(OtpCodeError);
        }
        Ok(Self(code))
    }

    /// Parse exactly four ASCII digits. A leading zero is never a valid code.
    ///
    /// # Errors
    ///
    /// Returns [`OtpCodeError`] for anything else.
    pub fn parse(input: &str) -> Result<Self, OtpCodeError> {
        let input = input.trim();
        if input.len() != 4 || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpCodeError);
        }
        input.parse::<u16>().map_err(|_| OtpCodeError).and_then(Self::new)
    }

    /// The numeric value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for OtpCode {
    type Error = OtpCodeError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<OtpCode> for u16 {
    fn from(code: OtpCode) -> Self {
        code.0
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(****)")
    }
}

/// Lifecycle state of an issued code.
///
/// `Consumed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpState {
    /// Unused and younger than [`OTP_VALIDITY`].
    Fresh,
    /// Already redeemed by a successful reset.
    Consumed,
    /// Unused but at least [`OTP_VALIDITY`] old.
    Expired,
}

impl OtpState {
    /// State of a code created at `created_at`, observed at `now`.
    #[must_use]
    pub fn at(used: bool, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if used {
            Self::Consumed
        } else if now - created_at >= OTP_VALIDITY {
            Self::Expired
        } else {
            Self::Fresh
        }
    }
}
