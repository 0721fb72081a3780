//! Listing image URLs.
//!
//! Shape checks live here. Whether the URL actually serves an image is
//! decided by the API's liveness probe using [`IMAGE_CONTENT_TYPES`].

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::validation::is_clean;

static IMAGE_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://.*\.(avif|apng|bmp|gif|ico|jpeg|jpg|png|svg|tiff?|webp|heic)$")
        .expect("image url pattern is valid")
});

/// `Content-Type` values a probed image URL may report.
pub const IMAGE_CONTENT_TYPES: &[&str] = &[
    "image/avif",
    "image/apng",
    "image/bmp",
    "image/gif",
    "image/x-icon",
    "image/vnd.microsoft.icon",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/svg+xml",
    "image/tiff",
    "image/webp",
    "image/heic",
];

/// Errors that can occur when parsing an [`ImageUrl`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageUrlError {
    /// The input is empty.
    #[error("image URL is required")]
    Empty,
    /// Longer than [`ImageUrl::MAX_LENGTH`].
    #[error("image URL must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Not an http(s) URL ending in a known image extension.
    #[error("invalid image URL")]
    InvalidFormat,
}

/// An http(s) URL whose path ends in an image file extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageUrl(String);

impl ImageUrl {
    /// Maximum length of an image URL.
    pub const MAX_LENGTH: usize = 2000;

    /// Parse and shape-check an image URL.
    ///
    /// # Errors
    ///
    /// Returns an [`ImageUrlError`] if the input is empty, too long, contains
    /// markup, does not parse as a URL, or lacks an image extension.
    pub fn parse(input: &str) -> Result<Self, ImageUrlError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ImageUrlError::Empty);
        }
        if input.chars().count() > Self::MAX_LENGTH {
            return Err(ImageUrlError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !is_clean(input) || !IMAGE_URL_PATTERN.is_match(input) {
            return Err(ImageUrlError::InvalidFormat);
        }
        Url::parse(input).map_err(|_| ImageUrlError::InvalidFormat)?;
        Ok(Self(input.to_owned()))
    }

    /// Wrap a value read back from storage without re-validating it.
    #[must_use]
    pub const fn from_trusted(url: String) -> Self {
        Self(url)
    }

    /// The URL as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a `Content-Type` header value names an accepted image type.
///
/// Parameters such as `; charset=...` are tolerated.
#[must_use]
pub fn is_image_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    IMAGE_CONTENT_TYPES
        .iter()
        .any(|accepted| content_type.contains(accepted))
}
