//! Error types for vibescout.

use thiserror::Error;

/// Result type alias using vibescout's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vibescout operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Place not found
    #[error("Place not found: {0}")]
    PlaceNotFound(uuid::Uuid),

    /// Candidate supplier (places directory) unavailable or rejected the call
    #[error("Supplier error: {0}")]
    Supplier(String),

    /// Review harvesting failed
    #[error("Harvest error: {0}")]
    Harvest(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Utterance could not be classified and no filter was extractable
    #[error("Ambiguous intent: {0}")]
    AmbiguousIntent(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
