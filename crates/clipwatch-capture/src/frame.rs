//! Decoded frame type and its wire codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CaptureError;
use crate::CaptureResult;

/// Bytes of fixed header in the wire encoding: width, height (u32) +
/// sequence (u64) + timestamp (i64), all big-endian.
const WIRE_HEADER_LEN: usize = 4 + 4 + 8 + 8;

/// A single decoded RGB24 frame.
///
/// Frames are immutable after production; holders share the pixel data via
/// cheap [`Bytes`] clones.
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB24 pixel data, row-major, no padding.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Capture timestamp in epoch milliseconds.
    pub timestamp_ms: i64,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl Frame {
    /// Create a new frame.
    pub fn new(data: Bytes, width: u32, height: u32, timestamp_ms: i64, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
            sequence,
        }
    }

    /// Expected RGB24 buffer size for the given dimensions.
    pub fn rgb24_buffer_size(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 3
    }

    /// Whether the pixel data matches the declared dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::rgb24_buffer_size(self.width, self.height)
    }

    /// Serialize the frame for the duplication channel.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(WIRE_HEADER_LEN + self.data.len());
        buf.put_u32(self.width);
        buf.put_u32(self.height);
        buf.put_u64(self.sequence);
        buf.put_i64(self.timestamp_ms);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Deserialize a frame received from the duplication channel.
    pub fn from_wire(mut payload: Bytes) -> CaptureResult<Self> {
        if payload.len() < WIRE_HEADER_LEN {
            return Err(CaptureError::InvalidFrame(format!(
                "payload too short: {} bytes",
                payload.len()
            )));
        }

        let width = payload.get_u32();
        let height = payload.get_u32();
        let sequence = payload.get_u64();
        let timestamp_ms = payload.get_i64();

        let frame = Self {
            data: payload,
            width,
            height,
            timestamp_ms,
            sequence,
        };

        if !frame.is_valid() {
            return Err(CaptureError::InvalidFrame(format!(
                "expected {} bytes for {}x{} RGB24, got {}",
                Self::rgb24_buffer_size(width, height),
                width,
                height,
                frame.data.len()
            )));
        }

        Ok(frame)
    }
}
