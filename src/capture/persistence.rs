//! Clip persistence
//!
//! Runs off the tick thread. Given the frames and metadata of one finished
//! recording it writes, in order: the video (through the encoder chain), a
//! thumbnail from the temporal midpoint, and the JSON record. When an
//! enricher is configured, a further detached thread asks it for a summary
//! and rewrites the record if one comes back before the process exits.
//! Every failure is logged; none is returned to the tick loop.

use super::encoder::{write_ppm, EncoderChain};
use super::frame::Frame;
use super::metadata::{ClipMetadata, ClipRecord};
use super::store::ClipStore;
use crate::app::config::CaptureConfig;
use crate::enrichment::ClipEnricher;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Receives finished recordings
pub trait ClipSink: Send + Sync + 'static {
    /// Persist one clip. Called on a detached thread.
    fn persist(&self, frames: Vec<Frame>, metadata: ClipMetadata);
}

/// Writes clips under the log directory layout of [`ClipStore`]
pub struct ClipWriter {
    store: ClipStore,
    encoders: EncoderChain,
    enricher: Option<Arc<dyn ClipEnricher>>,
    min_playback_fps: f64,
}

impl ClipWriter {
    /// Writer with the default encoder chain and no enricher
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            store: ClipStore::new(&config.log_dir),
            encoders: EncoderChain::default(),
            enricher: None,
            min_playback_fps: config.min_playback_fps,
        }
    }

    pub fn with_encoders(mut self, encoders: EncoderChain) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn with_enricher(mut self, enricher: Box<dyn ClipEnricher>) -> Self {
        self.enricher = Some(Arc::from(enricher));
        self
    }

    pub fn store(&self) -> &ClipStore {
        &self.store
    }

    /// Playback rate that makes the clip last its nominal duration
    pub fn playback_fps(&self, frame_count: usize, duration_s: f64) -> f64 {
        let fps = if duration_s > 0.0 {
            frame_count as f64 / duration_s
        } else {
            0.0
        };
        fps.max(self.min_playback_fps)
    }

    /// Write the video, thumbnail and JSON record for one clip. Enrichment
    /// is a separate step, see [`enrich`](Self::enrich).
    pub fn write(&self, frames: &[Frame], metadata: ClipMetadata) -> crate::Result<ClipRecord> {
        self.store.ensure_dirs()?;

        let stem = metadata.file_stem();
        let clip_id = metadata.clip_id;
        let clips_dir = self.store.clips_dir();
        let mut record = ClipRecord::new(metadata);

        let fps = self.playback_fps(frames.len(), record.metadata.duration);
        match self.encoders.encode(frames, fps, &clips_dir, &stem) {
            Ok(video) => {
                info!(clip_id = %clip_id, file = %video.file_name, codec = %video.codec, fps, "Clip video written");
                record.artifacts.video = Some(video.file_name);
                record.artifacts.codec = Some(video.codec);
            }
            Err(e) => error!(clip_id = %clip_id, error = %e, "Clip video lost"),
        }

        if let Some(mid) = frames.get(frames.len() / 2) {
            let thumb = format!("{}.ppm", clip_id);
            match write_ppm(mid, &clips_dir.join(&thumb)) {
                Ok(()) => record.artifacts.thumbnail = Some(thumb),
                Err(e) => warn!(clip_id = %clip_id, error = %e, "Thumbnail failed"),
            }
        }

        let json_path = record_path(&self.store, &record);
        write_record(&record, &json_path)?;
        info!(clip_id = %clip_id, path = %json_path.display(), frames = frames.len(), "Clip metadata written");

        Ok(record)
    }

    /// Ask the enricher for a summary and rewrite the record with it.
    /// Blocks for as long as the enricher does.
    pub fn enrich(&self, record: ClipRecord) -> crate::Result<ClipRecord> {
        match &self.enricher {
            Some(enricher) => enrich_record(enricher.as_ref(), &self.store, record),
            None => Ok(record),
        }
    }
}

impl ClipSink for ClipWriter {
    fn persist(&self, frames: Vec<Frame>, metadata: ClipMetadata) {
        let clip_id = metadata.clip_id;
        let record = match self.write(&frames, metadata) {
            Ok(record) => record,
            Err(e) => {
                error!(clip_id = %clip_id, error = %e, "Clip persistence failed");
                return;
            }
        };
        drop(frames);

        let Some(enricher) = self.enricher.clone() else {
            return;
        };
        if record.artifacts.video.is_none() {
            debug!(clip_id = %clip_id, "No video, skipping enrichment");
            return;
        }

        // Detached: shutdown waits for the record above, never for the enricher
        let store = self.store.clone();
        let spawned = std::thread::Builder::new()
            .name("clip-enricher".to_string())
            .spawn(move || {
                if let Err(e) = enrich_record(enricher.as_ref(), &store, record) {
                    warn!(clip_id = %clip_id, error = %e, "Enrichment failed");
                }
            });
        if let Err(e) = spawned {
            warn!(clip_id = %clip_id, error = %e, "Failed to spawn clip enricher");
        }
    }
}

fn record_path(store: &ClipStore, record: &ClipRecord) -> std::path::PathBuf {
    store
        .metadata_dir()
        .join(format!("{}.json", record.metadata.file_stem()))
}

fn enrich_record(enricher: &dyn ClipEnricher, store: &ClipStore, mut record: ClipRecord) -> crate::Result<ClipRecord> {
    let Some(video) = &record.artifacts.video else {
        return Ok(record);
    };
    let video_path = store.clips_dir().join(video);
    let clip_id = record.metadata.clip_id;

    if let Some(summary) = enricher.summarize(&video_path, &record.metadata)? {
        record.artifacts.summary = Some(summary);
        write_record(&record, &record_path(store, &record))?;
        info!(clip_id = %clip_id, "Clip summary attached");
    }
    Ok(record)
}

fn write_record(record: &ClipRecord, path: &Path) -> crate::Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::encoder::{ClipEncoder, Y4mEncoder};
    use crate::capture::metadata::utc_from_epoch;
    use crate::fusion::ThreatLevel;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use uuid::Uuid;

    struct NoEncoder;

    impl ClipEncoder for NoEncoder {
        fn name(&self) -> &str {
            "none"
        }
        fn extension(&self) -> &str {
            "none"
        }
        fn encode(&self, _: &[Frame], _: f64, _: &Path) -> crate::Result<()> {
            Err(crate::Error::Encode("unavailable".to_string()))
        }
    }

    struct FixedSummary;

    impl ClipEnricher for FixedSummary {
        fn summarize(&self, video: &Path, _metadata: &ClipMetadata) -> crate::Result<Option<String>> {
            assert!(video.exists());
            Ok(Some("Person lingers at the door".to_string()))
        }
    }

    fn metadata(frame_count: usize) -> ClipMetadata {
        ClipMetadata {
            clip_id: Uuid::new_v4(),
            timestamp: 1_700_000_000.0,
            started_at: utc_from_epoch(1_700_000_000.0),
            duration: 2.0,
            trigger_level: ThreatLevel::Suspicious,
            final_level: ThreatLevel::Suspicious,
            max_intent: 0.65,
            mean_intent: 0.62,
            weapon_detected: false,
            transitions: Vec::new(),
            signals_stats: BTreeMap::new(),
            frame_count,
        }
    }

    fn writer(dir: &TempDir, encoders: EncoderChain) -> ClipWriter {
        let config = CaptureConfig {
            log_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        ClipWriter::new(&config).with_encoders(encoders)
    }

    fn frames(n: u64) -> Vec<Frame> {
        (0..n).map(|i| Frame::filled(i, 4, 4, [i as u8, 0, 0])).collect()
    }

    #[test]
    fn test_playback_fps_floor() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, EncoderChain::default());
        assert_eq!(w.playback_fps(60, 2.0), 30.0);
        assert_eq!(w.playback_fps(1, 60.0), 1.0);
        assert_eq!(w.playback_fps(10, 0.0), 1.0);
    }

    #[test]
    fn test_write_all_artifacts() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, EncoderChain::new(vec![Box::new(Y4mEncoder)]));
        let meta = metadata(5);
        let stem = meta.file_stem();
        let id = meta.clip_id;

        let record = w.write(&frames(5), meta).unwrap();
        assert_eq!(record.artifacts.codec.as_deref(), Some("y4m"));
        assert_eq!(record.artifacts.thumbnail, Some(format!("{}.ppm", id)));

        let clips = dir.path().join("clips");
        assert!(clips.join(format!("{}.y4m", stem)).exists());
        assert!(clips.join(format!("{}.ppm", id)).exists());

        let json = std::fs::read_to_string(dir.path().join("metadata").join(format!("{}.json", stem))).unwrap();
        let back: ClipRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_thumbnail_uses_midpoint_frame() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, EncoderChain::new(vec![Box::new(Y4mEncoder)]));
        let meta = metadata(5);
        let id = meta.clip_id;
        w.write(&frames(5), meta).unwrap();

        let bytes = std::fs::read(dir.path().join("clips").join(format!("{}.ppm", id))).unwrap();
        let header_len = b"P6\n4 4\n255\n".len();
        // frame 2 is filled with red = 2
        assert_eq!(bytes[header_len], 2);
    }

    #[test]
    fn test_metadata_written_when_encoders_fail() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, EncoderChain::new(vec![Box::new(NoEncoder)]));
        let meta = metadata(3);
        let stem = meta.file_stem();

        let record = w.write(&frames(3), meta).unwrap();
        assert!(record.artifacts.video.is_none());
        assert!(dir.path().join("metadata").join(format!("{}.json", stem)).exists());
    }

    #[test]
    fn test_metadata_written_for_malformed_frames() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, EncoderChain::new(vec![Box::new(Y4mEncoder)]));
        let meta = metadata(3);
        let stem = meta.file_stem();
        let bad: Vec<Frame> = (0..3).map(|i| Frame::malformed(i, 2, 2, vec![0; 15])).collect();

        w.persist(bad, meta);
        assert!(dir.path().join("metadata").join(format!("{}.json", stem)).exists());
        let records = w.store().list().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].artifacts.video.is_none());
        assert!(records[0].artifacts.thumbnail.is_none());
    }

    #[test]
    fn test_enricher_summary_rewritten() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, EncoderChain::new(vec![Box::new(Y4mEncoder)])).with_enricher(Box::new(FixedSummary));
        let meta = metadata(2);
        let id = meta.clip_id;
        let record = w.write(&frames(2), meta).unwrap();
        assert_eq!(record.artifacts.summary, None);

        w.enrich(record).unwrap();
        let found = w.store().find(&id.to_string()).unwrap().unwrap();
        assert_eq!(found.artifacts.summary.as_deref(), Some("Person lingers at the door"));
    }

    /// Holds every summary request until released
    struct HeldSummary {
        released: Arc<AtomicBool>,
    }

    impl ClipEnricher for HeldSummary {
        fn summarize(&self, _video: &Path, _metadata: &ClipMetadata) -> crate::Result<Option<String>> {
            while !self.released.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(Some("Courier waits with a parcel".to_string()))
        }
    }

    #[test]
    fn test_persist_does_not_wait_for_enricher() {
        let dir = TempDir::new().unwrap();
        let released = Arc::new(AtomicBool::new(false));
        let w = writer(&dir, EncoderChain::new(vec![Box::new(Y4mEncoder)])).with_enricher(Box::new(HeldSummary {
            released: Arc::clone(&released),
        }));
        let meta = metadata(2);
        let id = meta.clip_id.to_string();

        // returns while the enricher is still blocked
        w.persist(frames(2), meta);
        let record = w.store().find(&id).unwrap().unwrap();
        assert!(record.artifacts.video.is_some());
        assert_eq!(record.artifacts.summary, None);

        released.store(true, Ordering::Release);
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut summary = None;
        while summary.is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            summary = w.store().find(&id).ok().flatten().and_then(|r| r.artifacts.summary);
        }
        assert_eq!(summary.as_deref(), Some("Courier waits with a parcel"));
    }
}
