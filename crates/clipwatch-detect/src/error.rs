//! Error types for the detection module.

use thiserror::Error;

/// Errors that can occur during activity detection.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Frame pixel data could not be interpreted as an image.
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),

    /// The external classifier failed to score the region.
    #[error("Classifier error: {0}")]
    Classifier(String),
}
