//! Replay driver
//!
//! Re-runs a recorded observation log through the real pipeline. The log is
//! JSON Lines, one [`TickRecord`] per line:
//!
//! ```text
//! {"t": 0.0, "keypoints": [[0.5, 0.4], ...], "violence": [0.9, 0.1], "weapons": [], "doorbell": false}
//! {"t": 0.033}
//! ```
//!
//! Recorded detector outputs are served by scripted detectors running on the
//! normal worker threads, keyed by frame sequence number, so the replay goes
//! through the same mailboxes as a live camera.

use super::sentinel::{DoorbellHandle, FrameSource};
use crate::capture::Frame;
use crate::signals::KeypointSet;
use crate::time::ManualClock;
use crate::workers::{Detector, PoseEstimator, ViolenceProbs, WeaponDetection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long a replay tick waits for a scripted worker to answer
pub const REPLAY_WORKER_TIMEOUT: Duration = Duration::from_secs(5);

/// One recorded tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickRecord {
    /// Seconds, relative or epoch
    pub t: f64,
    /// 33 `[x, y]` pairs; absent when no subject was visible
    #[serde(default)]
    pub keypoints: Option<Vec<[f64; 2]>>,
    /// Action classifier output; absent when none arrived this tick
    #[serde(default)]
    pub violence: Option<ViolenceProbs>,
    /// Object detector output; absent when none arrived this tick
    #[serde(default)]
    pub weapons: Option<Vec<WeaponDetection>>,
    #[serde(default)]
    pub doorbell: bool,
}

/// A parsed observation log
#[derive(Debug, Clone, Default)]
pub struct ReplayScript {
    records: Vec<TickRecord>,
}

impl ReplayScript {
    pub fn new(records: Vec<TickRecord>) -> Self {
        Self { records }
    }

    /// Parse JSON Lines. Blank lines are skipped; any other bad line fails
    /// with its line number.
    pub fn parse(content: &str) -> crate::Result<Self> {
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: TickRecord = serde_json::from_str(line)
                .map_err(|e| crate::Error::InvalidInput(format!("line {}: {}", i + 1, e)))?;
            if !record.t.is_finite() {
                return Err(crate::Error::InvalidInput(format!("line {}: non-finite time", i + 1)));
            }
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let script = Self::parse(&content)?;
        info!(path = %path.display(), ticks = script.len(), "Replay script loaded");
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, seq: u64) -> Option<&TickRecord> {
        usize::try_from(seq).ok().and_then(|i| self.records.get(i))
    }

    /// Span between the first and last record
    pub fn duration_s(&self) -> f64 {
        match (self.records.first(), self.records.last()) {
            (Some(a), Some(b)) => (b.t - a.t).max(0.0),
            _ => 0.0,
        }
    }
}

/// Serves recorded violence probabilities. Ticks without a record repeat the
/// previous value.
pub struct ScriptedViolence {
    script: Arc<ReplayScript>,
    last: ViolenceProbs,
}

impl ScriptedViolence {
    pub fn new(script: Arc<ReplayScript>) -> Self {
        Self {
            script,
            last: ViolenceProbs::default(),
        }
    }
}

impl Detector for ScriptedViolence {
    type Output = ViolenceProbs;

    fn infer(&mut self, frame: &Frame) -> crate::Result<ViolenceProbs> {
        if let Some(p) = self.script.get(frame.seq()).and_then(|r| r.violence) {
            self.last = p;
        }
        Ok(self.last)
    }
}

/// Serves recorded weapon detections. Ticks without a record repeat the
/// previous list.
pub struct ScriptedWeapons {
    script: Arc<ReplayScript>,
    last: Vec<WeaponDetection>,
}

impl ScriptedWeapons {
    pub fn new(script: Arc<ReplayScript>) -> Self {
        Self {
            script,
            last: Vec::new(),
        }
    }
}

impl Detector for ScriptedWeapons {
    type Output = Vec<WeaponDetection>;

    fn infer(&mut self, frame: &Frame) -> crate::Result<Vec<WeaponDetection>> {
        if let Some(w) = self.script.get(frame.seq()).and_then(|r| r.weapons.as_ref()) {
            self.last = w.clone();
        }
        Ok(self.last.clone())
    }
}

/// Serves recorded keypoints
pub struct ScriptedPose {
    script: Arc<ReplayScript>,
}

impl ScriptedPose {
    pub fn new(script: Arc<ReplayScript>) -> Self {
        Self { script }
    }
}

impl PoseEstimator for ScriptedPose {
    fn estimate(&mut self, frame: &Frame) -> crate::Result<Option<KeypointSet>> {
        match self.script.get(frame.seq()).and_then(|r| r.keypoints.as_deref()) {
            Some(pairs) => KeypointSet::from_pairs(pairs).map(Some),
            None => Ok(None),
        }
    }
}

/// Frame source over a script. Sets the shared clock to each record's time
/// and presses the doorbell where the record says so.
pub struct ReplaySource {
    script: Arc<ReplayScript>,
    next: usize,
    width: u32,
    height: u32,
    clock: ManualClock,
    doorbell: Option<DoorbellHandle>,
}

impl ReplaySource {
    pub fn new(script: Arc<ReplayScript>, width: u32, height: u32, clock: ManualClock) -> Self {
        Self {
            script,
            next: 0,
            width,
            height,
            clock,
            doorbell: None,
        }
    }

    pub fn with_doorbell(mut self, doorbell: DoorbellHandle) -> Self {
        self.doorbell = Some(doorbell);
        self
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Option<Frame> {
        let record = self.script.records.get(self.next)?;
        let seq = self.next as u64;
        self.next += 1;

        self.clock.set(record.t);
        if record.doorbell {
            if let Some(bell) = &self.doorbell {
                debug!(seq, "Replayed doorbell press");
                bell.press();
            }
        }

        // Uniform gray ramp so recorded clips are visibly ordered
        let shade = (seq % 256) as u8;
        Some(Frame::filled(seq, self.width, self.height, [shade, shade, shade]))
    }
}
