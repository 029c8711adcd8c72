//! Region-of-interest activity detection.
//!
//! [`MotionDetector`] consumes frames from the capture loop and yields a
//! boolean activity signal. Real work happens only on every Nth call to
//! amortize the cost of the underlying check; intermediate calls return
//! `false` immediately. Two interchangeable strategies satisfy the same
//! contract: an external classifier scoring the cropped region, and a
//! statistical background-difference check.

mod classifier;
mod detector;
mod diff;
mod error;

pub use classifier::{Classification, Classifier};
pub use detector::MotionDetector;
pub use diff::BackgroundDiff;
pub use error::DetectError;

/// Result type for detection operations.
pub type DetectResult<T> = Result<T, DetectError>;
