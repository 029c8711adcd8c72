//! Local frame duplication channel.
//!
//! One process owns the physical capture device and republishes its frames
//! over a unix-domain socket so independent consumers (the motion watcher,
//! a live-view client) can share the device without opening it twice.
//!
//! Wire format: each message is a 4-byte unsigned big-endian length prefix
//! followed by exactly that many bytes of serialized frame payload.

mod error;
mod publisher;
mod slot;
mod subscriber;
mod wire;

pub use error::RelayError;
pub use publisher::FramePublisher;
pub use slot::LatestSlot;
pub use subscriber::RelaySubscriber;
pub use wire::{read_message, write_message};

use std::time::Duration;

/// Sleep between device polls while no subscriber is connected.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long a subscriber waits for a frame before reporting end-of-stream.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(10);

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
