//! Capture-device reader backed by an ffmpeg child process.
//!
//! ffmpeg decodes the device (or any source it understands) to RGB24
//! rawvideo on stdout; frames are fixed-size, so one blocking `read_exact`
//! per frame is the entire demuxing story.

use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::frame::Frame;
use crate::{CaptureResult, FrameReader};

/// Configuration for [`FfmpegReader`].
#[derive(Debug, Clone)]
pub struct FfmpegReaderConfig {
    /// Device path or source URI (e.g. "/dev/video0").
    pub source: String,

    /// Output width in pixels; the decoded stream is scaled to this size.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Input pixel format requested from a V4L2 device (best-effort).
    pub input_format: Option<String>,

    /// Input frame rate requested from a V4L2 device (best-effort).
    pub input_frame_rate: Option<f64>,
}

/// Blocking frame reader over an ffmpeg child process.
pub struct FfmpegReader {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    frame_len: usize,
    width: u32,
    height: u32,
    sequence: u64,
}

impl FfmpegReader {
    /// Spawn ffmpeg against the configured source.
    pub fn open(config: &FfmpegReaderConfig) -> CaptureResult<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner").arg("-loglevel").arg("error");

        if config.source.starts_with("/dev/video") {
            cmd.arg("-f").arg("video4linux2");
            if let Some(ref format) = config.input_format {
                cmd.arg("-input_format").arg(format);
            }
            if let Some(fps) = config.input_frame_rate {
                cmd.arg("-framerate").arg(format!("{fps}"));
            }
            cmd.arg("-video_size")
                .arg(format!("{}x{}", config.width, config.height));
        }

        cmd.arg("-i")
            .arg(&config.source)
            .arg("-an")
            .arg("-vf")
            .arg(format!("scale={}:{}", config.width, config.height))
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        debug!(source = %config.source, "Spawning ffmpeg reader");

        let mut child = cmd.spawn().map_err(|e| CaptureError::DeviceOpen {
            capture_source: config.source.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| CaptureError::DeviceOpen {
            capture_source: config.source.clone(),
            reason: "failed to capture ffmpeg stdout".to_string(),
        })?;

        info!(
            source = %config.source,
            width = config.width,
            height = config.height,
            "Capture device opened"
        );

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            frame_len: Frame::rgb24_buffer_size(config.width, config.height),
            width: config.width,
            height: config.height,
            sequence: 0,
        })
    }
}

impl FrameReader for FfmpegReader {
    fn read_frame(&mut self) -> CaptureResult<Frame> {
        let stdout = match self.stdout.as_mut() {
            Some(stdout) => stdout,
            None => return Err(CaptureError::EndOfStream),
        };

        let mut buffer = vec![0u8; self.frame_len];
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                self.sequence += 1;
                Ok(Frame::new(
                    Bytes::from(buffer),
                    self.width,
                    self.height,
                    Utc::now().timestamp_millis(),
                    self.sequence,
                ))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("ffmpeg stream ended");
                Err(CaptureError::EndOfStream)
            }
            Err(e) => Err(CaptureError::DeviceRead(e.to_string())),
        }
    }

    fn release(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill ffmpeg child: {e}");
            }
            let _ = child.wait();
        }
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        self.release();
    }
}
