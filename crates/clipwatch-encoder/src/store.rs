//! Clip metadata store.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use clipwatch_types::{ClipId, ClipRecord};

use crate::error::StoreError;
use crate::StoreResult;

/// External store for per-clip metadata records.
///
/// Called synchronously from the encode worker; implementations must be
/// cheap enough to sit on that path. Failures are logged by the caller and
/// never abort encoding.
pub trait MetadataStore: Send + Sync {
    /// Create a record for a new clip and return its identifier.
    fn create(&self, video_file: &Path, frame_count: u64, frame_rate: f64)
        -> StoreResult<ClipId>;

    /// Update the encoded-frame count. Visible to concurrent readers once
    /// this returns.
    fn update_frame_count(&self, id: &ClipId, count: u64) -> StoreResult<()>;

    /// Attach a thumbnail image to the record.
    fn save_thumbnail(&self, id: &ClipId, image: &[u8]) -> StoreResult<PathBuf>;

    /// Mark the record complete.
    fn finalize(&self, id: &ClipId, title: &str) -> StoreResult<()>;
}

/// File-backed store keeping one JSON record per clip.
pub struct JsonMetadataStore {
    records_dir: PathBuf,
    thumbnails_dir: PathBuf,
}

impl JsonMetadataStore {
    /// Create a store rooted at the given directories, creating them if
    /// needed.
    pub fn open(
        records_dir: impl Into<PathBuf>,
        thumbnails_dir: impl Into<PathBuf>,
    ) -> StoreResult<Self> {
        let records_dir = records_dir.into();
        let thumbnails_dir = thumbnails_dir.into();
        fs::create_dir_all(&records_dir)?;
        fs::create_dir_all(&thumbnails_dir)?;
        Ok(Self {
            records_dir,
            thumbnails_dir,
        })
    }

    /// Load a record by id.
    pub fn load(&self, id: &ClipId) -> StoreResult<ClipRecord> {
        let path = self.record_path(id);
        let json = fs::read_to_string(&path)
            .map_err(|_| StoreError::NotFound(id.to_string()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn record_path(&self, id: &ClipId) -> PathBuf {
        self.records_dir.join(format!("{id}.json"))
    }

    /// Persist a record so the update is visible to any concurrent reader:
    /// write to a temp file, then rename over the record.
    fn persist(&self, record: &ClipRecord) -> StoreResult<()> {
        let path = self.record_path(&record.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl MetadataStore for JsonMetadataStore {
    fn create(
        &self,
        video_file: &Path,
        frame_count: u64,
        frame_rate: f64,
    ) -> StoreResult<ClipId> {
        let stem = video_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        let id = ClipId(stem);

        let record = ClipRecord::new(id.clone(), video_file.to_path_buf(), frame_count, frame_rate);
        self.persist(&record)?;

        debug!(id = %id, "Clip record created");
        Ok(id)
    }

    fn update_frame_count(&self, id: &ClipId, count: u64) -> StoreResult<()> {
        let mut record = self.load(id)?;
        record.num_frames = count;
        self.persist(&record)
    }

    fn save_thumbnail(&self, id: &ClipId, image: &[u8]) -> StoreResult<PathBuf> {
        let path = self.thumbnails_dir.join(format!("{id}.jpg"));
        fs::write(&path, image)?;

        let mut record = self.load(id)?;
        record.thumbnail_file = Some(path.clone());
        self.persist(&record)?;
        Ok(path)
    }

    fn finalize(&self, id: &ClipId, title: &str) -> StoreResult<()> {
        let mut record = self.load(id)?;
        record.title = Some(title.to_string());
        self.persist(&record)
    }
}
