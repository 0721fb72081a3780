//! Core types for Secure Commerce.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod card;
pub mod email;
pub mod id;
pub mod image_url;
pub mod otp;
pub mod password;
pub mod phone;
pub mod postal_code;
pub mod price;
pub mod role;

pub use card::{CardError, PaymentCard};
pub use email::{Email, EmailError};
pub use id::*;
pub use image_url::{IMAGE_CONTENT_TYPES, ImageUrl, ImageUrlError, is_image_content_type};
pub use otp::{OTP_VALIDITY, OtpCode, OtpCodeError, OtpState};
pub use password::{PasswordError, validate_password};
pub use phone::{PhoneError, PhoneNumber};
pub use postal_code::{PostalCode, PostalCodeError};
pub use price::{Price, PriceError};
pub use role::{Role, RoleError};
