//! Rate limiting domain errors

use thiserror::Error;

/// Errors surfaced by the rate limiter API
///
/// An over-limit request is not an error: it is reported through
/// `RateLimitResult::allowed`. Store failures during admission checks are
/// absorbed by failing open and only surface from the administrative
/// operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Unknown rate limit profile: {name}")]
    UnknownProfile { name: String },

    #[error("Rate limit store unavailable: {message}")]
    StoreUnavailable { message: String },
}

impl RateLimitError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Whether the error indicates a call-site bug rather than an infrastructure fault
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            RateLimitError::InvalidArgument { .. } | RateLimitError::UnknownProfile { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RateLimitError::invalid_argument("user id cannot be empty");
        assert_eq!(err.to_string(), "Invalid argument: user id cannot be empty");

        let err = RateLimitError::UnknownProfile {
            name: "bogus".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown rate limit profile: bogus");
    }

    #[test]
    fn test_programmer_error_classification() {
        assert!(RateLimitError::invalid_argument("x").is_programmer_error());
        assert!(!RateLimitError::store_unavailable("down").is_programmer_error());
    }
}
