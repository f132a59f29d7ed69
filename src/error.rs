//! Error types for the Turnstile service.

use thiserror::Error;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller broke the rate limiter's input contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No policy applies to the requested purpose
    #[error("No rate limit policy for purpose: {0}")]
    UnknownPurpose(String),

    /// The backing store could not complete an operation
    #[error("Store error: {0}")]
    Store(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for TurnstileError {
    fn from(err: config::ConfigError) -> Self {
        TurnstileError::Config(err.to_string())
    }
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
