//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur during encoding operations.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Encoder process could not be started.
    #[error("Failed to start encoder for {path}: {reason}")]
    Spawn { path: String, reason: String },

    /// Frame did not match the configured dimensions.
    #[error("Invalid input frame: {0}")]
    InvalidInput(String),

    /// Encoder rejected a frame or failed to flush.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Thumbnail rendering failed.
    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    /// Underlying I/O error.
    #[error("Encoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur in the metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with the given identifier.
    #[error("Unknown clip record: {0}")]
    NotFound(String),

    /// Record could not be serialized or parsed.
    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying I/O error.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
