//! Clip encoder backed by an ffmpeg child process.
//!
//! Raw RGB24 frames are piped into ffmpeg's stdin; ffmpeg encodes H.264 and
//! muxes the MP4 container. Closing stdin is the encoder flush: ffmpeg
//! drains its internal buffers, writes trailing packets, and finalizes the
//! container before exiting.

use std::io::Write;
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, warn};

use clipwatch_capture::Frame;

use crate::error::EncoderError;
use crate::{ClipEncoder, ClipEncoderConfig, EncoderResult};

/// ffmpeg-based H.264/MP4 clip encoder.
pub struct FfmpegClipEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    config: ClipEncoderConfig,
    frames_written: u64,
}

impl FfmpegClipEncoder {
    /// Spawn ffmpeg writing the clip at `path`.
    pub fn create(config: &ClipEncoderConfig, path: &Path) -> EncoderResult<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-video_size")
            .arg(format!("{}x{}", config.width, config.height))
            .arg("-framerate")
            .arg(format!("{}", config.frame_rate))
            .arg("-i")
            .arg("-")
            .arg("-c:v")
            .arg("libx264")
            .arg("-preset")
            .arg("veryfast")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg(path);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        debug!(path = %path.display(), "Spawning ffmpeg encoder");

        let mut child = cmd.spawn().map_err(|e| EncoderError::Spawn {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| EncoderError::Spawn {
            path: path.display().to_string(),
            reason: "failed to open ffmpeg stdin".to_string(),
        })?;

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            config: config.clone(),
            frames_written: 0,
        })
    }
}

impl ClipEncoder for FfmpegClipEncoder {
    fn encode(&mut self, frame: &Frame) -> EncoderResult<()> {
        let expected = Frame::rgb24_buffer_size(self.config.width, self.config.height);
        if frame.data.len() != expected {
            return Err(EncoderError::InvalidInput(format!(
                "expected {} bytes ({}x{} RGB24), got {}",
                expected,
                self.config.width,
                self.config.height,
                frame.data.len()
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EncoderError::Encoding("encoder already finished".to_string()))?;

        stdin
            .write_all(&frame.data)
            .map_err(|e| EncoderError::Encoding(e.to_string()))?;

        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> EncoderResult<()> {
        // Dropping stdin is the flush signal: ffmpeg emits trailing packets
        // and finalizes the container on EOF.
        self.stdin = None;

        let mut child = match self.child.take() {
            Some(child) => child,
            None => return Ok(()),
        };

        let status = child.wait().map_err(EncoderError::Io)?;
        if !status.success() {
            return Err(EncoderError::Encoding(format!(
                "ffmpeg exited with {status}"
            )));
        }

        info!(frames = self.frames_written, "Clip encoder finished");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffmpeg-libx264"
    }
}

impl Drop for FfmpegClipEncoder {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.finish() {
                warn!("Encoder finish on drop failed: {e}");
            }
        }
    }
}
