// Error types shared by the service and HTTP layers
// The HTTP status mapping lives in banner-server; this enum only carries
// the domain meaning of a failure.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum BannerError {
    #[error("{0} not found")]
    NotFound(String), // Referenced entity does not exist
    #[error("{0}")]
    Conflict(String), // Unique-key violation or a rejected destructive operation
    #[error("{0}")]
    Validation(String), // Field-format violation
    #[error("missing or invalid credential")]
    Unauthorized, // Credential absent or unresolvable
    #[error("backend unavailable: {0}")]
    Transient(String), // Store or cache temporarily unavailable
}

impl BannerError {
    pub fn not_found(kind: &str, key: &str) -> Self {
        BannerError::NotFound(format!("{} '{}'", kind, key))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BannerError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BannerError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = BannerError::not_found("flag", "checkout");
        assert_eq!(err.to_string(), "flag 'checkout' not found");
    }

    #[test]
    fn test_unauthorized_message() {
        assert_eq!(
            BannerError::Unauthorized.to_string(),
            "missing or invalid credential"
        );
    }
}
