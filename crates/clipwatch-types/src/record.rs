//! Per-clip metadata record.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier for a recorded clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipId(pub String);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClipId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Metadata for one recorded clip.
///
/// Created when a recording session opens, frame count updated while frames
/// are written, finalized when the session closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRecord {
    /// Record identifier.
    pub id: ClipId,

    /// Path of the clip file.
    pub video_file: PathBuf,

    /// Path of the thumbnail image, once saved.
    pub thumbnail_file: Option<PathBuf>,

    /// Number of frames encoded so far.
    pub num_frames: u64,

    /// Clip frame rate.
    pub frame_rate: f64,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Display title, set at finalization.
    pub title: Option<String>,
}

impl ClipRecord {
    /// Create a fresh record for a clip file.
    pub fn new(id: ClipId, video_file: PathBuf, num_frames: u64, frame_rate: f64) -> Self {
        Self {
            id,
            video_file,
            thumbnail_file: None,
            num_frames,
            frame_rate,
            created_at: Utc::now(),
            title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_through_json() {
        let record = ClipRecord::new(
            ClipId::from("2024-03-01_10-00-00"),
            PathBuf::from("videos/2024-03-01_10-00-00.mp4"),
            12,
            30.0,
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: ClipRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.num_frames, 12);
        assert!(back.thumbnail_file.is_none());
    }
}
