//! Markup sanitizing and free-text validation.
//!
//! Every string that reaches the service passes through [`sanitize`] first.
//! Input whose sanitized form differs from the original is rejected outright,
//! rather than being silently rewritten.

use thiserror::Error;

/// Errors that can occur when validating a free-text field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    /// The field is empty after trimming.
    #[error("{field} is required")]
    Empty {
        /// Human-readable field name.
        field: &'static str,
    },
    /// The field contains markup or characters that would be rewritten.
    #[error("{field} contains invalid characters")]
    Unsafe {
        /// Human-readable field name.
        field: &'static str,
    },
    /// The field is shorter or longer than allowed.
    #[error("{field} must be {min}-{max} characters")]
    Length {
        /// Human-readable field name.
        field: &'static str,
        /// Minimum allowed length in characters.
        min: usize,
        /// Maximum allowed length in characters.
        max: usize,
    },
}

/// Strip all HTML tags from `input` and escape what remains as text.
#[must_use]
pub fn sanitize(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string()
}

/// Returns `true` if sanitizing `input` leaves it unchanged.
#[must_use]
pub fn is_clean(input: &str) -> bool {
    sanitize(input) == input
}

/// Trim `input` and check it is clean and within `min..=max` characters.
///
/// # Errors
///
/// Returns a [`TextError`] naming `field` if the trimmed input is empty,
/// contains markup, or falls outside the length bounds.
pub fn clean_text(
    input: &str,
    min: usize,
    max: usize,
    field: &'static str,
) -> Result<String, TextError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TextError::Empty { field });
    }
    if !is_clean(trimmed) {
        return Err(TextError::Unsafe { field });
    }
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(TextError::Length { field, min, max });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_clean() {
        assert!(is_clean("Hello world"));
        assert!(is_clean("Passw0rd!"));
        assert!(is_clean("12 Main St., Apt #4"));
    }

    #[test]
    fn test_markup_is_not_clean() {
        assert!(!is_clean("<b>bold</b>"));
        assert!(!is_clean("<script>alert(1)</script>"));
        assert!(!is_clean("<img src=x onerror=alert(1)>"));
    }

    #[test]
    fn test_bare_angle_brackets_and_ampersands_are_not_clean() {
        assert!(!is_clean("a < b"));
        assert!(!is_clean("fish & chips"));
    }

    #[test]
    fn test_sanitize_strips_tags() {
        assert_eq!(sanitize("<b>hi</b>"), "hi");
    }

    #[test]
    fn test_clean_text_trims() {
        assert_eq!(clean_text("  Jo  ", 2, 40, "name").unwrap(), "Jo");
    }

    #[test]
    fn test_clean_text_length_bounds() {
        assert_eq!(
            clean_text("J", 2, 40, "name"),
            Err(TextError::Length {
                field: "name",
                min: 2,
                max: 40
            })
        );
        assert!(clean_text(&"x".repeat(41), 2, 40, "name").is_err());
        assert!(clean_text(&"x".repeat(40), 2, 40, "name").is_ok());
    }

    #[test]
    fn test_clean_text_counts_chars_not_bytes() {
        assert!(clean_text("Zoë", 2, 3, "name").is_ok());
    }

    #[test]
    fn test_clean_text_empty_and_unsafe() {
        assert_eq!(
            clean_text("   ", 2, 40, "feedback"),
            Err(TextError::Empty { field: "feedback" })
        );
        assert_eq!(
            clean_text("<i>hey</i>", 2, 40, "feedback"),
            Err(TextError::Unsafe { field: "feedback" })
        );
    }
}
