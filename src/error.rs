//! Error types for the sliding limiter.
//!
//! Limiter operations themselves are total; only construction and
//! configuration loading can fail.

use thiserror::Error;

/// Main error type for sliding limiter operations.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for LimiterError {
    fn from(err: config::ConfigError) -> Self {
        LimiterError::Config(err.to_string())
    }
}

/// Result type alias for sliding limiter operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
