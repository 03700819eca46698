//! Error types for the studio client

use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A client-side precondition blocked the operation before any request
    #[error("{0}")]
    Precondition(String),

    /// Network or connection failure talking to the server
    #[error("Connection error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered `{"success": false, "error": ...}`
    #[error("{0}")]
    Backend(String),

    /// History entry cannot be rerun (its reference image is not retained)
    #[error("Job '{0}' used a reference image and cannot be rerun")]
    RerunUnavailable(String),

    /// Local store could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a precondition failure
    pub fn precondition(message: impl Into<String>) -> Self {
        AppError::Precondition(message.into())
    }

    /// Whether this error was raised locally before any request was sent
    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::Precondition(_) | AppError::RerunUnavailable(_))
    }

    /// Whether this error came from the network layer
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }
}
