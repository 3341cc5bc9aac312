//! Key-format validation
//!
//! Flag, segment, environment, and variant keys are URL-safe lowercase
//! identifiers: `^[a-z][a-z0-9_]*$`.

use crate::error::BannerError;

/// Maximum accepted key length. Keys are embedded in cache keys and hash
/// salts, so an upper bound keeps those shapes predictable.
pub const MAX_KEY_LENGTH: usize = 128;

/// Return `true` if `key` matches `^[a-z][a-z0-9_]*$`.
pub fn is_valid_key(key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Validate a key, naming the offending field in the error.
pub fn validate_key(field: &str, key: &str) -> Result<(), BannerError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(BannerError::validation(format!(
            "invalid {}: '{}' must match ^[a-z][a-z0-9_]*$",
            field, key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(is_valid_key("checkout"));
        assert!(is_valid_key("new_dashboard_v2"));
        assert!(is_valid_key("a"));
        assert!(is_valid_key("p0"));
    }

    #[test]
    fn test_invalid_keys() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("Checkout"));
        assert!(!is_valid_key("9lives"));
        assert!(!is_valid_key("_private"));
        assert!(!is_valid_key("has-dash"));
        assert!(!is_valid_key("has space"));
        assert!(!is_valid_key("emoji🐟"));
    }

    #[test]
    fn test_key_length_bound() {
        let long = "a".repeat(MAX_KEY_LENGTH);
        assert!(is_valid_key(&long));
        let too_long = "a".repeat(MAX_KEY_LENGTH + 1);
        assert!(!is_valid_key(&too_long));
    }

    #[test]
    fn test_validate_key_error_names_field() {
        let err = validate_key("flag key", "Bad-Key").unwrap_err();
        assert!(err.to_string().contains("flag key"));
        assert!(err.to_string().contains("Bad-Key"));
    }
}
