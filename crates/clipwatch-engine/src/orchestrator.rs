//! The capture state machine.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error, info, warn};

use clipwatch_capture::{CaptureError, Frame, FrameSource};
use clipwatch_detect::MotionDetector;
use clipwatch_encoder::{
    ClipEncoder, ClipEncoderConfig, EncoderResult, MetadataStore, RecordingSession,
};
use clipwatch_types::{CancelToken, WatchConfig};

use crate::countdown::ActivityCountdown;
use crate::error::EngineError;
use crate::preroll::PreRollBuffer;
use crate::EngineResult;

/// Per-frame activity signal consumed by the orchestrator.
pub trait ActivityDetector: Send {
    /// Whether this frame shows activity.
    fn has_activity(&mut self, frame: &Frame) -> bool;
}

impl ActivityDetector for MotionDetector {
    fn has_activity(&mut self, frame: &Frame) -> bool {
        MotionDetector::has_activity(self, frame)
    }
}

/// Creates the encoder for each new clip.
pub type EncoderFactory =
    Box<dyn Fn(&ClipEncoderConfig, &Path) -> EncoderResult<Box<dyn ClipEncoder>> + Send>;

/// Pulls frames from the source and opens, extends, and closes recording
/// sessions based on detector activity and the post-roll countdown.
///
/// Two states: idle (no session) and recording (session open). Every frame
/// is appended to the pre-roll buffer regardless of state; a positive
/// detection while idle opens a session seeded with a snapshot of that
/// buffer. Each countdown expiry closes the clip; the next event opens a
/// fresh one.
pub struct CaptureOrchestrator {
    source: Box<dyn FrameSource>,
    detector: Box<dyn ActivityDetector>,
    store: Arc<dyn MetadataStore>,
    encoder_factory: EncoderFactory,
    config: WatchConfig,
    cancel: CancelToken,
}

impl CaptureOrchestrator {
    /// Create an orchestrator around a calibrated source.
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn ActivityDetector>,
        store: Arc<dyn MetadataStore>,
        encoder_factory: EncoderFactory,
        config: WatchConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            source,
            detector,
            store,
            encoder_factory,
            config,
            cancel,
        }
    }

    /// Run the pull loop until cancelled or the device is lost.
    ///
    /// On either exit path any open session is closed first (flushing its
    /// queue, never discarding it) and the source is released.
    pub fn run(mut self) -> EngineResult<()> {
        fs::create_dir_all(&self.config.videos_dir)?;

        let frame_rate = self.source.frame_rate();
        let (height, width) = self.source.resolution();
        let mut preroll = PreRollBuffer::new(self.config.pre_roll_frames(frame_rate));
        let mut countdown = ActivityCountdown::new(self.config.post_roll_frames(frame_rate));
        let mut session: Option<RecordingSession> = None;

        info!(
            frame_rate,
            width,
            height,
            pre_roll_frames = preroll.capacity(),
            post_roll_frames = self.config.post_roll_frames(frame_rate),
            "Capture loop starting"
        );

        let mut status = Ok(());

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop requested, exiting capture loop");
                break;
            }

            let frame = match self.source.next_frame() {
                Ok(frame) => frame,
                Err(CaptureError::EndOfStream) => {
                    warn!("Capture source ended");
                    status = Err(EngineError::DeviceLost);
                    break;
                }
                Err(e) => {
                    warn!("Capture source failed: {e}");
                    status = Err(e.into());
                    break;
                }
            };

            preroll.push(frame.clone());

            let activity = self.detector.has_activity(&frame);
            if activity {
                countdown.arm();
                if session.is_none() {
                    match self.open_session(&preroll, frame_rate, width, height) {
                        Ok(new_session) => {
                            session = Some(new_session);
                            // The buffered frames now live in the clip seed.
                            preroll.clear();
                        }
                        Err(e) => {
                            // Capture continues; the next positive detection
                            // retries.
                            error!("Failed to open recording session: {e}");
                        }
                    }
                }
            }

            let mut expired = false;
            if let Some(active) = session.as_ref() {
                if activity {
                    active.write_frame(frame);
                } else if countdown.is_active() {
                    active.write_frame(frame);
                    countdown.tick();
                } else {
                    expired = true;
                }
            }
            if expired {
                if let Some(mut finished) = session.take() {
                    finished.close();
                    debug!("Post-roll expired, back to idle");
                }
            }
        }

        if let Some(mut active) = session.take() {
            info!("Closing open recording session");
            active.close();
        }
        self.source.close();

        info!("Capture loop stopped");
        status
    }

    fn open_session(
        &self,
        preroll: &PreRollBuffer,
        frame_rate: f64,
        width: u32,
        height: u32,
    ) -> EncoderResult<RecordingSession> {
        let filename = Local::now().format("%Y-%m-%d_%H-%M-%S.mp4").to_string();
        let path = self.config.videos_dir.join(filename);

        let encoder_config = ClipEncoderConfig {
            width,
            height,
            frame_rate,
        };
        let encoder = (self.encoder_factory)(&encoder_config, &path)?;

        info!(
            path = %path.display(),
            seed_frames = preroll.len(),
            "Activity detected, opening recording session"
        );

        Ok(RecordingSession::open(
            path,
            preroll.snapshot(),
            frame_rate,
            encoder,
            Arc::clone(&self.store),
        ))
    }
}
