//! Shared configuration and record types for clipwatch.
//!
//! This crate defines the types passed between the daemon, the capture
//! engine, and the encode pipeline: runtime configuration, the region of
//! interest, and the per-clip metadata record.

mod cancel;
mod config;
mod record;
mod roi;

pub use cancel::CancelToken;
pub use config::{DetectionStrategy, WatchConfig};
pub use record::{ClipId, ClipRecord};
pub use roi::{PixelRect, RegionOfInterest};
