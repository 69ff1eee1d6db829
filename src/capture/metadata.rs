//! Clip metadata and persisted records

use crate::fusion::ThreatLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A level change observed while recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Epoch seconds
    pub timestamp: f64,
    /// Seconds since the recording started
    pub rel_time: f64,
    pub from: ThreatLevel,
    pub to: ThreatLevel,
}

/// Aggregate of one signal over a clip
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalStat {
    pub mean: f64,
    pub max: f64,
}

/// Immutable description of a finished recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub clip_id: Uuid,
    /// Recording start, epoch seconds
    pub timestamp: f64,
    /// Recording start, UTC
    pub started_at: DateTime<Utc>,
    /// Nominal clip length in seconds
    pub duration: f64,
    pub trigger_level: ThreatLevel,
    pub final_level: ThreatLevel,
    pub max_intent: f64,
    pub mean_intent: f64,
    /// Whether a confirmed weapon was seen during the clip
    pub weapon_detected: bool,
    pub transitions: Vec<Transition>,
    pub signals_stats: BTreeMap<String, SignalStat>,
    pub frame_count: usize,
}

impl ClipMetadata {
    /// File stem shared by the clip's video and metadata files
    pub fn file_stem(&self) -> String {
        let short = self.clip_id.simple().to_string();
        format!(
            "event_{}_{}_{}",
            self.started_at.format("%Y%m%d_%H%M%S"),
            self.final_level,
            &short[..8]
        )
    }

    /// Max of one signal's stat, 0 when absent
    pub fn stat_max(&self, signal: &str) -> f64 {
        self.signals_stats.get(signal).map_or(0.0, |s| s.max)
    }
}

/// Files written for a clip
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipArtifacts {
    /// Video file name inside the clips directory
    pub video: Option<String>,
    /// Encoder that produced the video
    pub codec: Option<String>,
    /// Thumbnail file name inside the clips directory
    pub thumbnail: Option<String>,
    /// Free-text summary from the enrichment service
    pub summary: Option<String>,
}

/// Persisted form of a clip: metadata plus artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRecord {
    #[serde(flatten)]
    pub metadata: ClipMetadata,
    #[serde(default)]
    pub artifacts: ClipArtifacts,
}

impl ClipRecord {
    pub fn new(metadata: ClipMetadata) -> Self {
        Self {
            metadata,
            artifacts: ClipArtifacts::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.metadata.clip_id
    }
}

/// Convert epoch seconds to UTC, falling back to the epoch
pub fn utc_from_epoch(seconds: f64) -> DateTime<Utc> {
    if !seconds.is_finite() {
        return DateTime::<Utc>::default();
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_metadata() -> ClipMetadata {
        ClipMetadata {
            clip_id: Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap(),
            timestamp: 1_700_000_000.5,
            started_at: utc_from_epoch(1_700_000_000.5),
            duration: 60.0,
            trigger_level: ThreatLevel::Suspicious,
            final_level: ThreatLevel::Threat,
            max_intent: 0.82,
            mean_intent: 0.66,
            weapon_detected: false,
            transitions: vec![Transition {
                timestamp: 1_700_000_010.0,
                rel_time: 9.5,
                from: ThreatLevel::Suspicious,
                to: ThreatLevel::Threat,
            }],
            signals_stats: BTreeMap::from([(
                "velocity".to_string(),
                SignalStat { mean: 0.4, max: 1.2 },
            )]),
            frame_count: 1800,
        }
    }

    #[test]
    fn test_file_stem() {
        let meta = sample_metadata();
        // 1700000000 = 2023-11-14T22:13:20Z
        assert_eq!(meta.file_stem(), "event_20231114_221320_THREAT_67e55044");
    }

    #[test]
    fn test_record_json_is_flat() {
        let record = ClipRecord::new(sample_metadata());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["clip_id"], "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(json["final_level"], "THREAT");
        assert_eq!(json["transitions"][0]["from"], "SUSPICIOUS");
        assert!(json["artifacts"]["video"].is_null());
    }

    #[test]
    fn test_record_roundtrip() {
        let mut record = ClipRecord::new(sample_metadata());
        record.artifacts.video = Some("clip.webm".to_string());
        let json = serde_json::to_string(&record).unwrap();
        let back: ClipRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_stat_max() {
        let meta = sample_metadata();
        assert_eq!(meta.stat_max("velocity"), 1.2);
        assert_eq!(meta.stat_max("head_down"), 0.0);
    }

    #[test]
    fn test_utc_from_epoch() {
        let t = utc_from_epoch(0.25);
        assert_eq!(t.timestamp(), 0);
        assert_eq!(t.timestamp_subsec_millis(), 250);
        assert_eq!(utc_from_epoch(f64::NAN).timestamp(), 0);
    }
}
