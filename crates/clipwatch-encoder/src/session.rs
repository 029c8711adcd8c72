//! Recording session: one clip, one encode worker.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use clipwatch_capture::Frame;
use clipwatch_types::ClipId;

use crate::store::MetadataStore;
use crate::thumbnail::render_jpeg_thumbnail;
use crate::{ClipEncoder, SESSION_POLL_TIMEOUT, THUMBNAIL_JPEG_QUALITY};

/// Owns one output clip's encode pipeline.
///
/// The caller enqueues frames without blocking; a dedicated worker drains
/// the queue, encodes, and keeps the metadata record current. Pre-roll seed
/// frames are always encoded before any live frame, in order.
pub struct RecordingSession {
    path: PathBuf,
    frame_tx: Option<Sender<Frame>>,
    worker: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSession {
    /// Open a session writing to `path`, seeded with the pre-roll snapshot.
    ///
    /// The encoder is already bound to the output file; the metadata record
    /// and thumbnail are created on the worker before the first frame is
    /// encoded, so the record exists even if the session is interrupted
    /// immediately.
    pub fn open(
        path: PathBuf,
        initial_frames: Vec<Frame>,
        frame_rate: f64,
        encoder: Box<dyn ClipEncoder>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        // Unbounded on purpose: capture must never block on a slow encoder.
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded();

        let worker_path = path.clone();
        let worker = thread::spawn(move || {
            write_loop(worker_path, initial_frames, frame_rate, encoder, store, frame_rx);
        });

        info!(path = %path.display(), "Recording session opened");

        Self {
            path,
            frame_tx: Some(frame_tx),
            worker: Some(worker),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Output clip path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Enqueue a frame. Never blocks; frames arriving after close are
    /// dropped without error.
    pub fn write_frame(&self, frame: Frame) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = &self.frame_tx {
            let _ = tx.send(frame);
        }
    }

    /// Signal end-of-input and wait for the worker to drain the queue,
    /// flush the encoder, and finalize the metadata record. Idempotent.
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!(path = %self.path.display(), "Closing recording session");

        // Dropping the sender is the end-of-input signal; the worker drains
        // whatever is already enqueued before finalizing.
        self.frame_tx = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_loop(
    path: PathBuf,
    initial_frames: Vec<Frame>,
    frame_rate: f64,
    mut encoder: Box<dyn ClipEncoder>,
    store: Arc<dyn MetadataStore>,
    frame_rx: Receiver<Frame>,
) {
    // Thumbnail source: most recent pre-roll frame, else the first live
    // frame. Waiting on the channel here cannot hang: closing the session
    // disconnects it.
    let mut pending_live: Option<Frame> = None;
    let thumbnail_frame = match initial_frames.last() {
        Some(frame) => Some(frame.clone()),
        None => match frame_rx.recv() {
            Ok(frame) => {
                pending_live = Some(frame.clone());
                Some(frame)
            }
            Err(_) => None,
        },
    };

    // Record and thumbnail exist before the first frame is encoded, so an
    // immediately-interrupted session still leaves a usable record.
    let id = match store.create(&path, initial_frames.len() as u64, frame_rate) {
        Ok(id) => Some(id),
        Err(e) => {
            error!("Failed to create clip record: {e}");
            None
        }
    };

    if let (Some(id), Some(frame)) = (id.as_ref(), thumbnail_frame.as_ref()) {
        match render_jpeg_thumbnail(frame, THUMBNAIL_JPEG_QUALITY) {
            Ok(jpeg) => {
                if let Err(e) = store.save_thumbnail(id, &jpeg) {
                    warn!("Failed to save thumbnail: {e}");
                }
            }
            Err(e) => warn!("Failed to render thumbnail: {e}"),
        }
    }

    let mut encoded: u64 = 0;
    let mut abandoned = false;

    // Pre-roll seed first, in arrival order, before any live frame.
    for frame in &initial_frames {
        match encoder.encode(frame) {
            Ok(()) => encoded += 1,
            Err(e) => {
                error!("Encode failed on pre-roll frame, abandoning session: {e}");
                abandoned = true;
                break;
            }
        }
    }
    drop(initial_frames);
    update_count(store.as_ref(), id.as_ref(), encoded);

    if !abandoned {
        if let Some(frame) = pending_live.take() {
            match encoder.encode(&frame) {
                Ok(()) => encoded += 1,
                Err(e) => {
                    error!("Encode failed, abandoning session: {e}");
                    abandoned = true;
                }
            }
        }
    }

    // Drain the live queue. The poll timeout bounds how long the close
    // signal can go unnoticed; a disconnected-and-empty channel means close
    // was requested and everything enqueued has been consumed.
    let mut dirty = false;
    while !abandoned {
        match frame_rx.recv_timeout(SESSION_POLL_TIMEOUT) {
            Ok(frame) => match encoder.encode(&frame) {
                Ok(()) => {
                    encoded += 1;
                    dirty = true;
                }
                Err(e) => {
                    error!("Encode failed, abandoning session: {e}");
                    abandoned = true;
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                if dirty {
                    update_count(store.as_ref(), id.as_ref(), encoded);
                    dirty = false;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Flush trailing packets and release the output handle even when the
    // session was abandoned mid-write.
    if let Err(e) = encoder.finish() {
        warn!("Encoder flush failed: {e}");
    }

    update_count(store.as_ref(), id.as_ref(), encoded);
    if let Some(id) = id.as_ref() {
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Err(e) = store.finalize(id, &title) {
            warn!("Failed to finalize clip record: {e}");
        }
    }

    info!(
        frames = encoded,
        path = %path.display(),
        abandoned,
        "Recording session finished"
    );
}

fn update_count(store: &dyn MetadataStore, id: Option<&ClipId>, count: u64) {
    if let Some(id) = id {
        if let Err(e) = store.update_frame_count(id, count) {
            warn!("Failed to update frame count: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bytes::Bytes;
    use parking_lot::Mutex;

    use crate::error::EncoderError;
    use crate::{EncoderResult, StoreResult};

    use super::*;

    fn frame(sequence: u64) -> Frame {
        let data = Bytes::from(vec![0u8; Frame::rgb24_buffer_size(4, 4)]);
        Frame::new(data, 4, 4, 0, sequence)
    }

    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<String>>>);

    impl EventLog {
        fn push(&self, event: impl Into<String>) {
            self.0.lock().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().clone()
        }

        fn position(&self, event: &str) -> Option<usize> {
            self.0.lock().iter().position(|e| e == event)
        }
    }

    struct MockEncoder {
        log: EventLog,
        sequences: Arc<Mutex<Vec<u64>>>,
        fail_after: Option<usize>,
    }

    impl ClipEncoder for MockEncoder {
        fn encode(&mut self, frame: &Frame) -> EncoderResult<()> {
            if let Some(limit) = self.fail_after {
                if self.sequences.lock().len() >= limit {
                    return Err(EncoderError::Encoding("scripted failure".into()));
                }
            }
            self.sequences.lock().push(frame.sequence);
            self.log.push(format!("encode:{}", frame.sequence));
            Ok(())
        }

        fn finish(&mut self) -> EncoderResult<()> {
            self.log.push("finish");
            Ok(())
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    struct MemoryStore {
        log: EventLog,
        counts: Arc<Mutex<Vec<u64>>>,
    }

    impl MetadataStore for MemoryStore {
        fn create(
            &self,
            _video_file: &Path,
            frame_count: u64,
            _frame_rate: f64,
        ) -> StoreResult<ClipId> {
            self.log.push(format!("create:{frame_count}"));
            Ok(ClipId::from("clip"))
        }

        fn update_frame_count(&self, _id: &ClipId, count: u64) -> StoreResult<()> {
            self.counts.lock().push(count);
            Ok(())
        }

        fn save_thumbnail(&self, _id: &ClipId, _image: &[u8]) -> StoreResult<PathBuf> {
            self.log.push("thumbnail");
            Ok(PathBuf::from("thumb.jpg"))
        }

        fn finalize(&self, _id: &ClipId, _title: &str) -> StoreResult<()> {
            self.log.push("finalize");
            Ok(())
        }
    }

    struct Harness {
        log: EventLog,
        sequences: Arc<Mutex<Vec<u64>>>,
        counts: Arc<Mutex<Vec<u64>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                log: EventLog::default(),
                sequences: Arc::new(Mutex::new(Vec::new())),
                counts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn open(&self, initial: Vec<Frame>, fail_after: Option<usize>) -> RecordingSession {
            let encoder = MockEncoder {
                log: self.log.clone(),
                sequences: Arc::clone(&self.sequences),
                fail_after,
            };
            let store = MemoryStore {
                log: self.log.clone(),
                counts: Arc::clone(&self.counts),
            };
            RecordingSession::open(
                PathBuf::from("videos/clip.mp4"),
                initial,
                30.0,
                Box::new(encoder),
                Arc::new(store),
            )
        }
    }

    #[test]
    fn test_preroll_then_live_frames_in_exact_order() {
        let harness = Harness::new();
        let mut session = harness.open(vec![frame(1), frame(2), frame(3)], None);

        for sequence in 4..=6 {
            session.write_frame(frame(sequence));
        }
        session.close();

        assert_eq!(*harness.sequences.lock(), vec![1, 2, 3, 4, 5, 6]);

        // Record and thumbnail exist before the first encoded frame.
        assert!(harness.log.position("create:3") < harness.log.position("encode:1"));
        assert!(harness.log.position("thumbnail") < harness.log.position("encode:1"));

        // Flush happens before the record is finalized.
        assert!(harness.log.position("finish") < harness.log.position("finalize"));

        // Frame counts only ever grow, ending at the total.
        let counts = harness.counts.lock().clone();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counts.last(), Some(&6));
    }

    #[test]
    fn test_thumbnail_uses_first_live_frame_without_preroll() {
        let harness = Harness::new();
        let mut session = harness.open(Vec::new(), None);

        session.write_frame(frame(10));
        session.write_frame(frame(11));
        session.close();

        // The thumbnail frame is not consumed out of order.
        assert_eq!(*harness.sequences.lock(), vec![10, 11]);
        assert!(harness.log.position("thumbnail") < harness.log.position("encode:10"));
    }

    #[test]
    fn test_close_is_idempotent_and_drops_late_writes() {
        let harness = Harness::new();
        let mut session = harness.open(vec![frame(1)], None);

        session.close();
        session.close();

        session.write_frame(frame(99));
        assert_eq!(*harness.sequences.lock(), vec![1]);
    }

    #[test]
    fn test_session_closed_before_any_frame_still_leaves_a_record() {
        let harness = Harness::new();
        let mut session = harness.open(Vec::new(), None);
        session.close();

        assert!(harness.sequences.lock().is_empty());
        let events = harness.log.events();
        assert!(events.contains(&"create:0".to_string()));
        assert!(events.contains(&"finalize".to_string()));
        // No frame ever arrived, so there is nothing to thumbnail.
        assert!(!events.contains(&"thumbnail".to_string()));
    }

    #[test]
    fn test_encoder_failure_abandons_but_still_finalizes() {
        let harness = Harness::new();
        let mut session = harness.open(vec![frame(1)], Some(2));

        for sequence in 2..=5 {
            session.write_frame(frame(sequence));
        }
        session.close();

        assert_eq!(*harness.sequences.lock(), vec![1, 2]);
        assert!(harness.log.position("finish").is_some());
        assert!(harness.log.position("finalize").is_some());
        assert_eq!(harness.counts.lock().last(), Some(&2));
    }
}
