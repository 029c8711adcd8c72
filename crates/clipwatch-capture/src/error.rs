//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture source could not be opened.
    #[error("Failed to open capture source {capture_source}: {reason}")]
    DeviceOpen { capture_source: String, reason: String },

    /// A single read from the device failed.
    #[error("Device read failed: {0}")]
    DeviceRead(String),

    /// The source has stopped producing frames. Fatal to the current
    /// capture loop; any restart policy belongs to the caller.
    #[error("End of stream")]
    EndOfStream,

    /// Frame payload did not match the expected dimensions.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
