//! Error types for autotrack-core

use thiserror::Error;

/// Main error type for the autotrack-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Pipeline cannot start with the current configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A single platform failed to accept an event
    #[error("delivery to {platform} failed: {message}")]
    PlatformDelivery { platform: String, message: String },

    /// Failure while turning an interaction into an event
    #[error("capture error: {0}")]
    Capture(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a delivery failure attributed to `platform`.
    pub fn delivery(platform: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::PlatformDelivery {
            platform: platform.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for autotrack-core
pub type Result<T> = std::result::Result<T, Error>;
