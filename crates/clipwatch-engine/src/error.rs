//! Error types for the engine.

use thiserror::Error;

/// Errors that end the capture loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The capture device stopped producing frames. The loop has already
    /// performed an orderly shutdown (open session closed, source
    /// released) when this is returned.
    #[error("Capture device lost")]
    DeviceLost,

    /// Source could not be opened or calibrated.
    #[error("Capture error: {0}")]
    Capture(#[from] clipwatch_capture::CaptureError),

    /// Output directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
