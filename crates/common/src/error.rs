//! Error types for vaultbank.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    /// The caller presented no usable credential. Deliberately carries no
    /// detail about why (expired vs tampered vs malformed).
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The recipient address can never be delivered to. Kept distinct
    /// from [`Self::Email`] so task workers can fail permanently
    /// instead of retrying.
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    // === Server Errors ===
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code for API responses and logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidRecipient(_) => "INVALID_RECIPIENT",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Email(_) => "EMAIL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        !matches!(
            self,
            Self::Unauthorized | Self::BadRequest(_) | Self::InvalidRecipient(_)
        )
    }
}

// === From implementations ===

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AppError::Unauthorized.error_code(), "UNAUTHORIZED");
        assert_eq!(
            AppError::Queue("boom".to_string()).error_code(),
            "QUEUE_ERROR"
        );
        assert_eq!(
            AppError::InvalidRecipient("x".to_string()).error_code(),
            "INVALID_RECIPIENT"
        );
    }

    #[test]
    fn unauthorized_is_not_a_server_error() {
        assert!(!AppError::Unauthorized.is_server_error());
        assert!(!AppError::InvalidRecipient("x".to_string()).is_server_error());
        assert!(AppError::Redis("down".to_string()).is_server_error());
    }
}
