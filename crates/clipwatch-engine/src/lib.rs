//! Capture orchestrator for clipwatch.
//!
//! This crate coordinates the frame source, the motion detector, and the
//! recording sessions: frames are pulled on one capture thread, buffered
//! for pre-roll, and routed into a session while the post-roll countdown
//! is live.

mod countdown;
mod error;
mod orchestrator;
mod preroll;
mod shutdown;

pub use countdown::ActivityCountdown;
pub use error::EngineError;
pub use orchestrator::{ActivityDetector, CaptureOrchestrator, EncoderFactory};
pub use preroll::PreRollBuffer;
pub use shutdown::ShutdownCoordinator;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
