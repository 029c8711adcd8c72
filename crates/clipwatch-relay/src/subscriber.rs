//! Subscriber side of the duplication channel.

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use clipwatch_capture::{CaptureError, CaptureResult, Frame, FrameReader};

use crate::error::RelayError;
use crate::slot::LatestSlot;
use crate::wire::read_message;
use crate::{RelayResult, DEFAULT_MAX_IDLE};

/// Consumer of the duplication channel.
///
/// Connects once, then runs a dedicated receive thread that feeds a
/// single-slot overwrite queue: a consumer polling slower than the publisher
/// only ever sees the newest frame. Implements [`FrameReader`], so it can be
/// calibrated and consumed exactly like a directly-attached device.
pub struct RelaySubscriber {
    stream: UnixStream,
    slot: Arc<LatestSlot<Bytes>>,
    recv_thread: Option<JoinHandle<()>>,
    max_idle: Duration,
}

impl RelaySubscriber {
    /// Connect with the default idle bound.
    pub fn connect(path: impl AsRef<Path>) -> RelayResult<Self> {
        Self::connect_with_idle(path, DEFAULT_MAX_IDLE)
    }

    /// Connect to the publisher socket. `max_idle` bounds how long a read
    /// waits for a frame before the stream is considered dead.
    pub fn connect_with_idle(path: impl AsRef<Path>, max_idle: Duration) -> RelayResult<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| RelayError::Connect {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        info!(path = %path.display(), "Connected to frame publisher");

        let slot = Arc::new(LatestSlot::new());
        let recv_thread = spawn_receive_loop(stream.try_clone()?, Arc::clone(&slot));

        Ok(Self {
            stream,
            slot,
            recv_thread: Some(recv_thread),
            max_idle,
        })
    }
}

fn spawn_receive_loop(mut stream: UnixStream, slot: Arc<LatestSlot<Bytes>>) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            match read_message(&mut stream) {
                Ok(Some(payload)) => slot.publish(payload),
                Ok(None) => {
                    debug!("Publisher closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Receive loop error: {e}");
                    break;
                }
            }
        }
        slot.close();
    })
}

impl FrameReader for RelaySubscriber {
    fn read_frame(&mut self) -> CaptureResult<Frame> {
        match self.slot.take(self.max_idle) {
            Some(payload) => Frame::from_wire(payload),
            None => Err(CaptureError::EndOfStream),
        }
    }

    fn release(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        self.slot.close();
        if let Some(handle) = self.recv_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RelaySubscriber {
    fn drop(&mut self) {
        self.release();
    }
}
