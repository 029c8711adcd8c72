//! Error types for the duplication channel.

use thiserror::Error;

/// Errors that can occur on the duplication channel.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Could not bind the publisher socket.
    #[error("Failed to bind relay socket {path}: {reason}")]
    Bind { path: String, reason: String },

    /// Could not connect to the publisher.
    #[error("Failed to connect to relay socket {path}: {reason}")]
    Connect { path: String, reason: String },

    /// The peer closed the connection.
    #[error("Relay peer closed the connection")]
    PeerClosed,

    /// Underlying I/O error.
    #[error("Relay I/O error: {0}")]
    Io(#[from] std::io::Error),
}
