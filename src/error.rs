//! Error types shared across the extension contexts

use thiserror::Error;

/// Errors that can occur inside the extension
#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid trail length: {0}")]
    InvalidTrailLength(u32),

    #[error("Injection failed: {0}")]
    InjectionFailed(String),

    #[error("Message delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("No active tab")]
    NoActiveTab,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Result type for extension operations
pub type ExtensionResult<T> = Result<T, ExtensionError>;
