//! Clip state machine
//!
//! ```text
//!          score >= trigger || weapon          now > stop deadline
//!   IDLE ─────────────────────────────▶ RECORDING ─────────────────▶ COOLDOWN
//!    ▲                                                                  │
//!    └──────────────────────── now >= cooldown expiry ──────────────────┘
//! ```
//!
//! `update_state` runs first each tick and handles triggering and session
//! statistics; `update_frame` runs second, buffers the frame and handles the
//! timed exits. Finished recordings are moved to a [`ClipSink`] on a detached
//! thread, so no tick ever waits on disk.

use super::frame::Frame;
use super::metadata::{utc_from_epoch, ClipMetadata, SignalStat, Transition};
use super::persistence::ClipSink;
use crate::app::config::CaptureConfig;
use crate::fusion::ThreatLevel;
use crate::signals::SignalBundle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Signal left out of clip statistics
const EXCLUDED_STAT: &str = "weapon_cooldown";
/// Signal zeroed when no weapon was confirmed during the clip
const WEAPON_SCORE_STAT: &str = "weapon_score";

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClipState {
    #[default]
    Idle,
    Recording,
    Cooldown,
}

impl std::fmt::Display for ClipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClipState::Idle => "IDLE",
            ClipState::Recording => "RECORDING",
            ClipState::Cooldown => "COOLDOWN",
        };
        f.write_str(s)
    }
}

/// Running {sum, max, count} for one signal
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    sum: f64,
    max: f64,
    count: u64,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.max = self.max.max(value);
        self.count += 1;
    }

    fn stat(&self) -> Option<SignalStat> {
        (self.count > 0).then(|| SignalStat {
            mean: self.sum / self.count as f64,
            max: self.max,
        })
    }
}

/// Statistics for the recording in progress
#[derive(Debug)]
struct Session {
    start: f64,
    stop_deadline: f64,
    trigger_level: ThreatLevel,
    current_level: ThreatLevel,
    transitions: Vec<Transition>,
    signals: BTreeMap<&'static str, Accumulator>,
    weapon_seen: bool,
    max_intent: f64,
    sum_intent: f64,
    count_intent: u64,
}

impl Session {
    fn new(level: ThreatLevel, now: f64, duration_s: f64) -> Self {
        Self {
            start: now,
            stop_deadline: now + duration_s,
            trigger_level: level,
            current_level: level,
            transitions: Vec::new(),
            signals: BTreeMap::new(),
            weapon_seen: false,
            max_intent: 0.0,
            sum_intent: 0.0,
            count_intent: 0,
        }
    }

    fn observe(&mut self, level: ThreatLevel, score: f64, signals: &SignalBundle, weapon: bool, now: f64) {
        if level != self.current_level {
            self.transitions.push(Transition {
                timestamp: now,
                rel_time: now - self.start,
                from: self.current_level,
                to: level,
            });
            self.current_level = level;
        }

        self.weapon_seen |= weapon;
        self.max_intent = self.max_intent.max(score);
        self.sum_intent += score;
        self.count_intent += 1;

        for (name, value) in signals.numeric() {
            self.signals.entry(name).or_insert_with(Accumulator::new).add(value);
        }
    }

    fn finish(self, duration_s: f64, frame_count: usize) -> ClipMetadata {
        let mut stats: BTreeMap<String, SignalStat> = self
            .signals
            .iter()
            .filter(|(name, _)| **name != EXCLUDED_STAT)
            .filter_map(|(name, acc)| acc.stat().map(|s| (name.to_string(), s)))
            .collect();

        if !self.weapon_seen {
            if let Some(stat) = stats.get_mut(WEAPON_SCORE_STAT) {
                *stat = SignalStat::default();
            }
        }

        let mean_intent = if self.count_intent > 0 {
            self.sum_intent / self.count_intent as f64
        } else {
            0.0
        };

        ClipMetadata {
            clip_id: Uuid::new_v4(),
            timestamp: self.start,
            started_at: utc_from_epoch(self.start),
            duration: duration_s,
            trigger_level: self.trigger_level,
            final_level: self.current_level,
            max_intent: self.max_intent,
            mean_intent,
            weapon_detected: self.weapon_seen,
            transitions: self.transitions,
            signals_stats: stats,
            frame_count,
        }
    }
}

/// Event-capture state machine
pub struct ClipRecorder {
    config: CaptureConfig,
    sink: Arc<dyn ClipSink>,
    state: ClipState,
    session: Option<Session>,
    frames: Vec<Frame>,
    cooldown_expiry: f64,
    pending: Vec<JoinHandle<()>>,
    clips_finalized: u64,
}

impl ClipRecorder {
    pub fn new(config: &CaptureConfig, sink: Arc<dyn ClipSink>) -> Self {
        if config.disabled {
            info!("Clip capture disabled");
        }
        Self {
            config: config.clone(),
            sink,
            state: ClipState::Idle,
            session: None,
            frames: Vec::new(),
            cooldown_expiry: 0.0,
            pending: Vec::new(),
            clips_finalized: 0,
        }
    }

    /// Trigger check and statistics. Call once per tick, before `update_frame`.
    pub fn update_state(
        &mut self,
        level: ThreatLevel,
        score: f64,
        signals: &SignalBundle,
        weapon_confirmed: bool,
        now: f64,
    ) {
        if self.config.disabled {
            return;
        }

        if self.state == ClipState::Idle && (score >= self.config.trigger_score || weapon_confirmed) {
            info!(score, level = %level, weapon = weapon_confirmed, "Recording triggered");
            self.state = ClipState::Recording;
            self.session = Some(Session::new(level, now, self.config.clip_duration_s));
            self.frames = Vec::new();
        }

        if let Some(session) = self.session.as_mut() {
            session.observe(level, score, signals, weapon_confirmed, now);
        }
    }

    /// Buffer the frame and apply timed exits. Call once per tick.
    pub fn update_frame(&mut self, frame: Frame, now: f64) {
        if self.config.disabled {
            return;
        }

        match self.state {
            ClipState::Recording => {
                self.frames.push(frame);
                let expired = self.session.as_ref().map_or(true, |s| now > s.stop_deadline);
                if expired {
                    self.finalize(now);
                }
            }
            ClipState::Cooldown => {
                if now >= self.cooldown_expiry {
                    debug!("Cooldown over");
                    self.state = ClipState::Idle;
                }
            }
            ClipState::Idle => {}
        }
    }

    fn finalize(&mut self, now: f64) {
        let frames = std::mem::take(&mut self.frames);
        self.state = ClipState::Cooldown;
        self.cooldown_expiry = now + self.config.cooldown_s;

        let Some(session) = self.session.take() else {
            return;
        };
        let metadata = session.finish(self.config.clip_duration_s, frames.len());
        self.clips_finalized += 1;
        info!(
            clip_id = %metadata.clip_id,
            frames = frames.len(),
            final_level = %metadata.final_level,
            "Recording finished"
        );

        self.pending.retain(|h| !h.is_finished());
        let sink = Arc::clone(&self.sink);
        let spawned = std::thread::Builder::new()
            .name("clip-writer".to_string())
            .spawn(move || sink.persist(frames, metadata));
        match spawned {
            Ok(handle) => self.pending.push(handle),
            Err(e) => error!(error = %e, "Failed to spawn clip writer"),
        }
    }

    /// Wait for every pending clip write. A recording still in progress is
    /// discarded.
    pub fn shutdown(&mut self) {
        if self.state == ClipState::Recording {
            warn!(frames = self.frames.len(), "Discarding unfinished recording");
            self.frames.clear();
            self.session = None;
            self.state = ClipState::Idle;
        }
        for handle in self.pending.drain(..) {
            if handle.join().is_err() {
                error!("Clip writer panicked");
            }
        }
    }

    /// Forget any in-progress recording and return to IDLE
    pub fn reset(&mut self) {
        self.frames.clear();
        self.session = None;
        self.state = ClipState::Idle;
        self.cooldown_expiry = 0.0;
    }

    pub fn state(&self) -> ClipState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == ClipState::Recording
    }

    /// Frames buffered for the recording in progress
    pub fn buffered_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn clips_finalized(&self) -> u64 {
        self.clips_finalized
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }
}
