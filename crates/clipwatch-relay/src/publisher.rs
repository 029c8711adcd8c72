//! Publisher side of the duplication channel.

use std::io::ErrorKind;
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use clipwatch_capture::{CaptureError, FrameReader};
use clipwatch_types::CancelToken;

use crate::error::RelayError;
use crate::slot::LatestSlot;
use crate::wire::write_message;
use crate::{RelayResult, IDLE_POLL_INTERVAL};

/// Poll interval for the accept loop while waiting for connections.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a handler waits on its slot before re-checking for shutdown.
const HANDLER_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// A send that cannot complete within this bound means the subscriber's
/// buffer cannot accept the write; the connection is dropped.
const SUBSCRIBER_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// One connected subscriber: its overwrite slot and the handler thread
/// draining it into the socket.
struct SubscriberHandle {
    slot: Arc<LatestSlot<Bytes>>,
    handler: Option<JoinHandle<()>>,
}

/// Owns the physical capture device and republishes its frames to all
/// connected subscribers.
///
/// While no subscriber is connected the device is left alone and the loop
/// sleeps at a reduced rate. Each subscriber gets a dedicated handler
/// thread fed through a single-slot overwrite queue, so a slow subscriber
/// skips frames instead of delaying the broadcast loop or its peers.
pub struct FramePublisher {
    socket_path: PathBuf,
    reader: Box<dyn FrameReader>,
}

impl FramePublisher {
    /// Create a publisher for the given socket path and device reader.
    pub fn new(socket_path: impl Into<PathBuf>, reader: Box<dyn FrameReader>) -> Self {
        Self {
            socket_path: socket_path.into(),
            reader,
        }
    }

    /// Run the broadcast loop until cancelled or the device ends.
    pub fn run(mut self, cancel: CancelToken) -> RelayResult<()> {
        // A stale socket file from a previous run would fail the bind.
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| RelayError::Bind {
            path: self.socket_path.display().to_string(),
            reason: e.to_string(),
        })?;
        listener.set_nonblocking(true)?;

        info!(path = %self.socket_path.display(), "Frame publisher listening");

        let subscribers: Arc<Mutex<Vec<SubscriberHandle>>> = Arc::new(Mutex::new(Vec::new()));
        // Separate stop flag for the accept loop: the publisher also shuts
        // down on its own when the device ends, without a caller-side cancel.
        let stop = CancelToken::new();
        let accept_thread = spawn_accept_loop(
            listener,
            Arc::clone(&subscribers),
            cancel.clone(),
            stop.clone(),
        );

        let mut published: u64 = 0;
        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            {
                let mut subs = subscribers.lock();
                // A handler that exited closed its slot; forget the handle.
                subs.retain(|handle| !handle.slot.is_closed());

                // No consumer: skip the device read entirely.
                if subs.is_empty() {
                    drop(subs);
                    thread::sleep(IDLE_POLL_INTERVAL);
                    continue;
                }
            }

            let frame = match self.reader.read_frame() {
                Ok(frame) => frame,
                Err(CaptureError::EndOfStream) => {
                    info!("Capture device ended, stopping publisher");
                    break Ok(());
                }
                Err(e) => {
                    warn!("Device read failed: {e}");
                    continue;
                }
            };

            let payload = frame.to_wire();
            published += 1;

            for handle in subscribers.lock().iter() {
                handle.slot.publish(payload.clone());
            }
        };

        self.reader.release();

        // Stop accepting first so no handler is registered after the drain.
        stop.cancel();
        let _ = accept_thread.join();

        // Wake every handler and wait for it to let go of its socket.
        let drained: Vec<SubscriberHandle> = subscribers.lock().drain(..).collect();
        for handle in &drained {
            handle.slot.close();
        }
        for mut handle in drained {
            if let Some(thread) = handle.handler.take() {
                let _ = thread.join();
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);

        info!(published, "Frame publisher stopped");
        result
    }
}

fn spawn_accept_loop(
    listener: UnixListener,
    subscribers: Arc<Mutex<Vec<SubscriberHandle>>>,
    cancel: CancelToken,
    stop: CancelToken,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !cancel.is_cancelled() && !stop.is_cancelled() {
            match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = stream.set_write_timeout(Some(SUBSCRIBER_WRITE_TIMEOUT)) {
                        warn!("Failed to configure subscriber socket: {e}");
                        continue;
                    }
                    info!("Subscriber connected");

                    let slot = Arc::new(LatestSlot::new());
                    let handler = spawn_subscriber_handler(stream, Arc::clone(&slot));
                    subscribers.lock().push(SubscriberHandle {
                        slot,
                        handler: Some(handler),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("Accept failed: {e}");
                    break;
                }
            }
        }
        debug!("Accept loop stopped");
    })
}

fn spawn_subscriber_handler(
    mut stream: UnixStream,
    slot: Arc<LatestSlot<Bytes>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            let payload = match slot.take(HANDLER_POLL_TIMEOUT) {
                Some(payload) => payload,
                None if slot.is_closed() => break,
                None => continue,
            };

            if let Err(e) = write_message(&mut stream, &payload) {
                debug!("Dropping subscriber: {e}");
                break;
            }
        }

        slot.close();
        let _ = stream.shutdown(Shutdown::Both);
        debug!("Subscriber handler stopped");
    })
}
