//! Payment card details.
//!
//! Cards are checked for shape and expiry only. Nothing here talks to a
//! payment network, and card values are never persisted.

use core::fmt;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Errors that can occur when validating a [`PaymentCard`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardError {
    /// The card number is not exactly 16 digits.
    #[error("card number must be 16 digits")]
    Number,
    /// The security code is not 3 or 4 digits.
    #[error("card security code must be 3 or 4 digits")]
    SecurityCode,
    /// The expiry is not `MM/YY`.
    #[error("card expiry must be MM/YY")]
    ExpiryFormat,
    /// The expiry month has already passed.
    #[error("card has expired")]
    Expired,
}

/// A card that passed shape and expiry checks.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentCard {
    number: String,
    expiry_month: u32,
    expiry_year: i32,
}

impl PaymentCard {
    /// Validate card details as of `today`.
    ///
    /// A card expiring this month is still accepted.
    ///
    /// # Errors
    ///
    /// Returns the first [`CardError`] found, checking number, security code,
    /// expiry format and expiry date in that order.
    pub fn parse(
        number: &str,
        security_code: &str,
        expiry: &str,
        today: NaiveDate,
    ) -> Result<Self, CardError> {
        let number = number.trim();
        if number.len() != 16 || !all_digits(number) {
            return Err(CardError::Number);
        }

        let security_code = security_code.trim();
        if !(3..=4).contains(&security_code.len()) || !all_digits(security_code) {
            return Err(CardError::SecurityCode);
        }

        let (month, year) = parse_expiry(expiry.trim()).ok_or(CardError::ExpiryFormat)?;
        if (year, month) < (today.year(), today.month()) {
            return Err(CardError::Expired);
        }

        Ok(Self {
            number: number.to_owned(),
            expiry_month: month,
            expiry_year: year,
        })
    }

    /// Last four digits of the card number.
    #[must_use]
    pub fn last_four(&self) -> &str {
        self.number.get(12..).unwrap_or_default()
    }

    /// Expiry as `(month, four-digit year)`.
    #[must_use]
    pub const fn expiry(&self) -> (u32, i32) {
        (self.expiry_month, self.expiry_year)
    }
}

impl fmt::Debug for PaymentCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCard")
            .field("number", &format_args!("************{}", self.last_four()))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .finish()
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_expiry(expiry: &str) -> Option<(u32, i32)> {
    let (mm, yy) = expiry.split_once('/')?;
    if mm.len() != 2 || yy.len() != 2 || !all_digits(mm) || !all_digits(yy) {
        return None;
    }
    let month: u32 = mm.parse().ok()?;
    let year: i32 = yy.parse().ok()?;
    (1..=12).contains(&month).then_some((month, 2000 + year))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 20).unwrap()
    }

    #[test]
    fn test_accepts_valid_card() {
        let card = PaymentCard::parse("4111111111111111", "123", "12/27", today()).unwrap();
        assert_eq!(card.last_four(), "1111");
        assert_eq!(card.expiry(), (12, 2027));
        assert!(PaymentCard::parse("4111111111111111", "1234", "12/27", today()).is_ok());
    }

    #[test]
    fn test_current_month_is_not_expired() {
        assert!(PaymentCard::parse("4111111111111111", "123", "05/26", today()).is_ok());
        assert_eq!(
            PaymentCard::parse("4111111111111111", "123", "04/26", today()),
            Err(CardError::Expired)
        );
        assert_eq!(
            PaymentCard::parse("4111111111111111", "123", "12/25", today()),
            Err(CardError::Expired)
        );
    }

    #[test]
    fn test_rejects_bad_number() {
        assert_eq!(
            PaymentCard::parse("411111111111111", "123", "12/27", today()),
            Err(CardError::Number)
        );
        assert_eq!(
            PaymentCard::parse("4111 1111 1111 1111", "123", "12/27", today()),
            Err(CardError::Number)
        );
    }

    #[test]
    fn test_rejects_bad_security_code() {
        assert_eq!(
            PaymentCard::parse("4111111111111111", "12", "12/27", today()),
            Err(CardError::SecurityCode)
        );
        assert_eq!(
            PaymentCard::parse("4111111111111111", "12a", "12/27", today()),
            Err(CardError::SecurityCode)
        );
    }

    #[test]
    fn test_rejects_bad_expiry_format() {
        for expiry in ["13/27", "00/27", "1/27", "12/2027", "1227", ""] {
            assert_eq!(
                PaymentCard::parse("4111111111111111", "123", expiry, today()),
                Err(CardError::ExpiryFormat),
                "expiry {expiry:?}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_number() {
        let card = PaymentCard::parse("4111111111111234", "123", "12/27", today()).unwrap();
        let debug = format!("{card:?}");
        assert!(!debug.contains("4111111111111234"));
        assert!(debug.contains("1234"));
    }
}
