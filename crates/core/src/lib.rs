//! Secure Commerce Core - Shared types library.
//!
//! This crate provides the domain types used across all Secure Commerce components:
//! - `api` - The JSON HTTP service (accounts, password reset, listings, orders)
//! - `cli` - Command-line tools for migrations and account management
//!
//! # Architecture
//!
//! The core crate contains only types and pure predicates - no I/O, no database
//! access, no HTTP clients. Every constructor validates its input, so a value of
//! one of these types is always in-policy once it exists.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, prices, contact details and OTPs
//! - [`validation`] - Markup sanitizing and free-text checks shared by every field

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{TextError, clean_text, is_clean, sanitize};
