//! Request body extraction.
//!
//! Clients send JSON whose scalar fields are not always typed consistently:
//! a price may arrive as `100` or `"100"`, a listing id as `7` or `"7"`.
//! Request structs declare such fields as `Option<Loose>` and hand the text to
//! the services, which own all parsing and validation.

use axum::extract::FromRequest;
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// JSON body extractor whose rejection is an [`AppError`].
///
/// A body that is not valid JSON, or whose shape does not match `T`, becomes
/// a 400 with a `{"detail": ...}` body instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// A JSON scalar (string, number or boolean) kept as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loose(String);

impl Loose {
    /// The value as sent, numbers rendered in their JSON form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl<'de> Deserialize<'de> for Loose {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = match Scalar::deserialize(deserializer)? {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
            // Debug keeps the fraction, so `100.0` never passes as an integer
            Scalar::Float(f) => format!("{f:?}"),
            Scalar::Bool(b) => b.to_string(),
        };
        Ok(Self(text))
    }
}

/// Text of an optional field, with blank values treated as absent.
#[must_use]
pub fn text(value: Option<Loose>) -> Option<String> {
    value.map(Loose::into_inner).filter(|s| !s.trim().is_empty())
}

/// Text of a field that must be present.
///
/// # Errors
///
/// Returns a 400 with `message` if the field is absent, null or blank.
pub fn required(value: Option<Loose>, message: &str) -> Result<String, AppError> {
    text(value).ok_or_else(|| AppError::bad_request(message))
}
