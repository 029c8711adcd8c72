//! Clip encoding for clipwatch.
//!
//! A [`RecordingSession`] owns one output clip: it drains a frame queue on a
//! dedicated worker thread, feeds a [`ClipEncoder`], emits a thumbnail, and
//! keeps the clip's metadata record current while frames are written.

mod error;
mod ffmpeg;
mod session;
mod store;
mod thumbnail;

pub use error::{EncoderError, StoreError};
pub use ffmpeg::FfmpegClipEncoder;
pub use session::RecordingSession;
pub use store::{JsonMetadataStore, MetadataStore};
pub use thumbnail::render_jpeg_thumbnail;

use std::path::Path;
use std::time::Duration;

use clipwatch_capture::Frame;

/// Poll timeout for the encode worker's queue, bounding how long the close
/// signal can go unobserved.
pub const SESSION_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// JPEG quality used for clip thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Result type for metadata store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Encoder configuration for one clip.
#[derive(Debug, Clone)]
pub struct ClipEncoderConfig {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Clip frame rate.
    pub frame_rate: f64,
}

/// Sink encoding raw frames into one output clip.
pub trait ClipEncoder: Send {
    /// Encode one frame. Frames arrive in capture order.
    fn encode(&mut self, frame: &Frame) -> EncoderResult<()>;

    /// Flush buffered output, finalize the container, and release the
    /// output handle. Idempotent.
    fn finish(&mut self) -> EncoderResult<()>;

    /// Encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the default clip encoder for the given output path.
pub fn create_clip_encoder(
    config: &ClipEncoderConfig,
    path: &Path,
) -> EncoderResult<Box<dyn ClipEncoder>> {
    let encoder = FfmpegClipEncoder::create(config, path)?;
    Ok(Box::new(encoder))
}
