//! Runtime configuration for the watcher.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::roi::RegionOfInterest;

/// Which activity check runs on evaluation frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStrategy {
    /// Exponentially-decayed background image and pixel-difference count.
    FrameDiff,

    /// External classifier scoring the cropped region.
    Classifier,
}

/// Configuration consumed at watcher construction.
///
/// Values are read once when the capture loop starts; changing them requires
/// restarting the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Capture device path or source URI (e.g. "/dev/video0").
    pub source: String,

    /// Requested capture width in pixels. Best-effort: the device may
    /// deliver a different size.
    pub width: u32,

    /// Requested capture height in pixels.
    pub height: u32,

    /// Region of the frame examined for activity.
    pub region: RegionOfInterest,

    /// Activity checks per second; resolved against the calibrated frame
    /// rate to a per-frame interval.
    pub checks_per_second: f64,

    /// Which activity check to run.
    pub strategy: DetectionStrategy,

    /// Fraction of region pixels that must change to count as activity
    /// (frame-diff strategy).
    pub motion_threshold: f64,

    /// Minimum classifier confidence to count as activity (classifier
    /// strategy).
    pub confidence_threshold: f32,

    /// Classifier labels that count as activity. Empty accepts any label.
    pub target_classes: Vec<String>,

    /// Seconds of video retained before the triggering frame.
    pub pre_roll_seconds: f64,

    /// Seconds recording continues after the last detected activity.
    pub post_roll_seconds: f64,

    /// Frame-rate override; when set, calibration timing is skipped.
    pub forced_frame_rate: Option<f64>,

    /// Directory receiving finished clips.
    pub videos_dir: PathBuf,

    /// Directory receiving clip thumbnails.
    pub thumbnails_dir: PathBuf,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            source: "/dev/video0".to_string(),
            width: 640,
            height: 400,
            region: RegionOfInterest::default(),
            checks_per_second: 2.0,
            strategy: DetectionStrategy::FrameDiff,
            motion_threshold: 0.07,
            confidence_threshold: 0.6,
            target_classes: Vec::new(),
            pre_roll_seconds: 2.0,
            post_roll_seconds: 2.0,
            forced_frame_rate: None,
            videos_dir: PathBuf::from("videos"),
            thumbnails_dir: PathBuf::from("thumbnails"),
        }
    }
}

impl WatchConfig {
    /// Pre-roll capacity in frames for a calibrated frame rate.
    pub fn pre_roll_frames(&self, frame_rate: f64) -> usize {
        ((frame_rate * self.pre_roll_seconds).round() as usize).max(1)
    }

    /// Post-roll window in frames for a calibrated frame rate.
    pub fn post_roll_frames(&self, frame_rate: f64) -> u32 {
        ((frame_rate * self.post_roll_seconds).round() as u32).max(1)
    }

    /// Per-frame evaluation interval for a calibrated frame rate.
    pub fn check_interval_frames(&self, frame_rate: f64) -> u32 {
        if self.checks_per_second <= 0.0 {
            return 1;
        }
        ((frame_rate / self.checks_per_second).round() as u32).max(1)
    }
}
