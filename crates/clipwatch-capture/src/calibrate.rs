//! Source calibration: frame-rate measurement and warm-up handling.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::frame::Frame;
use crate::{
    CaptureResult, FrameReader, FrameSource, CALIBRATION_FRAME_COUNT,
    MAX_CONSECUTIVE_READ_FAILURES, WARMUP_FRAME_COUNT,
};

/// Measured properties of a frame source.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    /// Effective frames per second, rounded up to a whole number unless
    /// forced by configuration.
    pub frame_rate: f64,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,
}

/// A [`FrameReader`] wrapped with warm-up, frame-rate calibration, and
/// failure accounting.
///
/// Calibration happens once in [`CalibratedSource::open`]: a warm-up batch
/// of frames is discarded (absorbing auto-exposure settling), the resolution
/// is taken from the first post-warm-up frame, and a further fixed batch is
/// timed to derive the effective frame rate.
pub struct CalibratedSource {
    reader: Option<Box<dyn FrameReader>>,
    calibration: Calibration,
    consecutive_failures: u32,
}

impl CalibratedSource {
    /// Open and calibrate a source. A forced frame rate (> 0) skips the
    /// timing pass but not the warm-up.
    pub fn open(
        mut reader: Box<dyn FrameReader>,
        forced_frame_rate: Option<f64>,
    ) -> CaptureResult<Self> {
        for _ in 0..WARMUP_FRAME_COUNT {
            reader.read_frame()?;
        }

        let started = Instant::now();
        let first = reader.read_frame()?;
        let (width, height) = (first.width, first.height);

        let frame_rate = match forced_frame_rate {
            Some(fps) if fps > 0.0 => {
                debug!(fps, "Using forced frame rate");
                fps
            }
            _ => {
                for _ in 1..CALIBRATION_FRAME_COUNT {
                    reader.read_frame()?;
                }
                let elapsed = started.elapsed().as_secs_f64().max(1e-6);
                (CALIBRATION_FRAME_COUNT as f64 / elapsed).ceil()
            }
        };

        info!(
            frame_rate,
            width, height, "Capture source calibrated"
        );

        Ok(Self {
            reader: Some(reader),
            calibration: Calibration {
                frame_rate,
                width,
                height,
            },
            consecutive_failures: 0,
        })
    }

    /// Measured source properties.
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }
}

impl FrameSource for CalibratedSource {
    fn next_frame(&mut self) -> CaptureResult<Frame> {
        loop {
            let result = match self.reader.as_mut() {
                Some(reader) => reader.read_frame(),
                None => return Err(CaptureError::EndOfStream),
            };

            match result {
                Ok(frame) => {
                    self.consecutive_failures = 0;
                    return Ok(frame);
                }
                Err(CaptureError::EndOfStream) => {
                    self.close();
                    return Err(CaptureError::EndOfStream);
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    warn!(
                        failures = self.consecutive_failures,
                        "Frame read failed: {e}"
                    );
                    if self.consecutive_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        self.close();
                        return Err(CaptureError::EndOfStream);
                    }
                }
            }
        }
    }

    fn frame_rate(&self) -> f64 {
        self.calibration.frame_rate
    }

    fn resolution(&self) -> (u32, u32) {
        (self.calibration.height, self.calibration.width)
    }

    fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.release();
        }
    }
}

impl Drop for CalibratedSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    struct ScriptedReader {
        reads: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
        /// Read indices [start, end) that fail with a device error.
        fail_range: Option<(usize, usize)>,
        delay: Duration,
        sequence: u64,
    }

    impl ScriptedReader {
        fn new(
            reads: Arc<AtomicUsize>,
            releases: Arc<AtomicUsize>,
            fail_range: Option<(usize, usize)>,
            delay: Duration,
        ) -> Self {
            Self {
                reads,
                releases,
                fail_range,
                delay,
                sequence: 0,
            }
        }
    }

    impl FrameReader for ScriptedReader {
        fn read_frame(&mut self) -> CaptureResult<Frame> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if let Some((start, end)) = self.fail_range {
                if n >= start && n < end {
                    return Err(CaptureError::DeviceRead("scripted failure".into()));
                }
            }
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            self.sequence += 1;
            let data = Bytes::from(vec![0u8; Frame::rgb24_buffer_size(16, 8)]);
            Ok(Frame::new(data, 16, 8, 0, self.sequence))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_forced_rate_skips_timing_but_not_warmup() {
        let reads = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let reader = ScriptedReader::new(
            Arc::clone(&reads),
            Arc::clone(&releases),
            None,
            Duration::ZERO,
        );

        let source = CalibratedSource::open(Box::new(reader), Some(25.0)).unwrap();

        // Warm-up frames plus one resolution probe.
        assert_eq!(reads.load(Ordering::SeqCst), WARMUP_FRAME_COUNT + 1);
        assert_eq!(source.frame_rate(), 25.0);
        assert_eq!(source.resolution(), (8, 16));
    }

    #[test]
    fn test_measured_rate_is_a_whole_number() {
        let reads = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let reader = ScriptedReader::new(
            Arc::clone(&reads),
            Arc::clone(&releases),
            None,
            Duration::from_millis(2),
        );

        let source = CalibratedSource::open(Box::new(reader), None).unwrap();

        assert_eq!(
            reads.load(Ordering::SeqCst),
            WARMUP_FRAME_COUNT + CALIBRATION_FRAME_COUNT
        );
        let fps = source.frame_rate();
        assert!(fps >= 1.0);
        // 2ms sleep per frame bounds the measured rate at 500 fps.
        assert!(fps <= 500.0);
        assert_eq!(fps.fract(), 0.0);
    }

    #[test]
    fn test_repeated_failures_release_device_and_end_stream() {
        let reads = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let calibration_reads = WARMUP_FRAME_COUNT + 1;
        let reader = ScriptedReader::new(
            Arc::clone(&reads),
            Arc::clone(&releases),
            Some((calibration_reads, usize::MAX)),
            Duration::ZERO,
        );

        let mut source = CalibratedSource::open(Box::new(reader), Some(30.0)).unwrap();

        match source.next_frame() {
            Err(CaptureError::EndOfStream) => {}
            other => panic!("expected EndOfStream, got {other:?}"),
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // Subsequent calls keep reporting end-of-stream without touching the
        // released reader.
        let before = reads.load(Ordering::SeqCst);
        assert!(matches!(
            source.next_frame(),
            Err(CaptureError::EndOfStream)
        ));
        assert_eq!(reads.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let reads = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let calibration_reads = WARMUP_FRAME_COUNT + 1;
        // Two failures, fewer than the fatal threshold, then recovery.
        let reader = ScriptedReader::new(
            Arc::clone(&reads),
            Arc::clone(&releases),
            Some((calibration_reads, calibration_reads + 2)),
            Duration::ZERO,
        );

        let mut source = CalibratedSource::open(Box::new(reader), Some(30.0)).unwrap();
        let frame = source.next_frame().unwrap();
        assert!(frame.is_valid());
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }
}
