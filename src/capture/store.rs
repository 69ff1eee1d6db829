//! Clip store
//!
//! Flat keyed-record layout under the log directory:
//!
//! ```text
//! <log_dir>/
//!   clips/      video files and thumbnails
//!   metadata/   one JSON record per clip
//!   learning/   feedback reports
//! ```

use super::metadata::ClipRecord;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Read access to persisted clip records
#[derive(Debug, Clone)]
pub struct ClipStore {
    root: PathBuf,
}

impl ClipStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.root.join("clips")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    pub fn learning_dir(&self) -> PathBuf {
        self.root.join("learning")
    }

    /// Create the directory layout
    pub fn ensure_dirs(&self) -> crate::Result<()> {
        std::fs::create_dir_all(self.clips_dir())?;
        std::fs::create_dir_all(self.metadata_dir())?;
        Ok(())
    }

    /// All readable records, newest first. Unreadable files are skipped.
    pub fn list(&self) -> crate::Result<Vec<ClipRecord>> {
        let dir = self.metadata_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable clip record"),
            }
        }

        records.sort_by(|a, b| b.metadata.timestamp.total_cmp(&a.metadata.timestamp));
        Ok(records)
    }

    /// Record with the given clip id
    pub fn find(&self, clip_id: &str) -> crate::Result<Option<ClipRecord>> {
        let wanted = clip_id.trim().to_ascii_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .find(|r| r.metadata.clip_id.to_string() == wanted))
    }
}

fn read_record(path: &Path) -> crate::Result<ClipRecord> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
