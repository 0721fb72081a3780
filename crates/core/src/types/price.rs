//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when constructing a [`Price`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// A listing price outside the accepted range.
    #[error("price must be between {min} and {max}")]
    OutOfRange {
        /// Smallest accepted amount.
        min: i64,
        /// Largest accepted amount.
        max: i64,
    },
}

/// A non-negative amount in dollars.
///
/// Displays with a `$` prefix. Whole amounts omit the fractional part, so a
/// listing priced at 100 renders as `$100` while an order total of 19.5
/// renders as `$19.50`.
///
/// ```
/// use rust_decimal::Decimal;
/// use secure_commerce_core::Price;
///
/// let widget = Price::listing(100).unwrap();
/// assert_eq!(widget.to_string(), "$100");
/// assert_eq!(Price::new(Decimal::new(1950, 2)).unwrap().to_string(), "$19.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Smallest price a listing may have.
    pub const LISTING_MIN: i64 = 1;
    /// Largest price a listing may have.
    pub const LISTING_MAX: i64 = 1_000_000;

    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// A whole-dollar listing price within
    /// [`LISTING_MIN`](Self::LISTING_MIN)..=[`LISTING_MAX`](Self::LISTING_MAX).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::OutOfRange`] outside the accepted range.
    pub fn listing(dollars: i64) -> Result<Self, PriceError> {
        if !(Self::LISTING_MIN..=Self::LISTING_MAX).contains(&dollars) {
            return Err(PriceError::OutOfRange {
                min: Self::LISTING_MIN,
                max: Self::LISTING_MAX,
            });
        }
        Ok(Self(Decimal::from(dollars)))
    }

    /// The underlying amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.0.round_dp(2);
        if rounded.fract().is_zero() {
            write!(f, "${}", rounded.trunc())
        } else {
            write!(f, "${rounded:.2}")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_whole_amounts() {
        assert_eq!(Price::listing(100).unwrap().to_string(), "$100");
        assert_eq!(Price::new(Decimal::new(10000, 2)).unwrap().to_string(), "$100");
        assert_eq!(Price::ZERO.to_string(), "$0");
    }

    #[test]
    fn test_display_fractional_amounts() {
        assert_eq!(Price::new(Decimal::new(1950, 2)).unwrap().to_string(), "$19.50");
        assert_eq!(Price::new(Decimal::new(5, 2)).unwrap().to_string(), "$0.05");
        assert_eq!(Price::new(Decimal::new(19999, 3)).unwrap().to_string(), "$20");
    }

    #[test]
    fn test_listing_range() {
        assert!(Price::listing(1).is_ok());
        assert!(Price::listing(1_000_000).is_ok());
        assert_eq!(
            Price::listing(0),
            Err(PriceError::OutOfRange {
                min: 1,
                max: 1_000_000
            })
        );
        assert!(Price::listing(1_000_001).is_err());
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(Price::new(Decimal::new(-1, 0)), Err(PriceError::Negative));
    }

    #[test]
    fn test_line_totals_sum() {
        let a = Price::listing(100).unwrap().times(2);
        let b = Price::new(Decimal::new(1950, 2)).unwrap().times(3);
        let total: Price = [a, b].into_iter().sum();
        assert_eq!(total.amount(), Decimal::new(25850, 2));
        assert_eq!(total.to_string(), "$258.50");
    }
}
