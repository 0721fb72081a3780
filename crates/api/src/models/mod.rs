//! Domain records read from and written to the repositories.
//!
//! These are validated domain objects, separate from database row types and
//! from the JSON shapes returned by the routes.

pub mod account;
pub mod listing;
pub mod order;

use chrono::{DateTime, Utc};

use secure_commerce_core::{AccountId, FeedbackId, OtpCode, OtpId, OtpState};

pub use account::{Account, NewAccount, UserRecord};
pub use listing::{Listing, ListingView, NewListing};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem};

/// A one-time password issued for a password reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Otp {
    /// Unique OTP ID.
    pub id: OtpId,
    /// Account the code was issued to.
    pub account_id: AccountId,
    /// The four-digit code.
    pub code: OtpCode,
    /// Set once the code has been redeemed.
    pub used: bool,
    /// When the code was issued.
    pub created_at: DateTime<Utc>,
}

impl Otp {
    /// Lifecycle state of this code at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> OtpState {
        OtpState::at(self.used, self.created_at, now)
    }
}

/// A feedback message left by a signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    /// Unique feedback ID.
    pub id: FeedbackId,
    /// Author.
    pub account_id: AccountId,
    /// Message text, already validated.
    pub message: String,
    /// When the feedback was left.
    pub created_at: DateTime<Utc>,
}
