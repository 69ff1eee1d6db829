//! # Intent Sentinel
//!
//! Turns a per-tick stream of behavioral observations from a single camera
//! into a bounded intent score, a discrete threat level, and recorded
//! evidence clips.
//!
//! ## Overview
//!
//! Every tick the orchestrator feeds three kinds of observation into the
//! engine: body keypoints from a synchronous pose estimator, a violence
//! probability pair from an asynchronous action classifier, and weapon boxes
//! from an asynchronous object detector. The engine derives ~20 named
//! signals with temporal memory, fuses them into one score, classifies a
//! threat level and drives a clip recorder that persists evidence on a
//! detached thread.
//!
//! ## Quick Start
//!
//! ```no_run
//! use intent_sentinel::app::config::Config;
//! use intent_sentinel::capture::Frame;
//! use intent_sentinel::pipeline::Sentinel;
//!
//! let config = Config::default();
//! let mut sentinel = Sentinel::without_detectors(&config);
//!
//! let frame = Frame::blank(0, 64, 48);
//! let report = sentinel.tick(frame, 0.0);
//! println!("{:.2} {}", report.score, report.level);
//! ```
//!
//! ## Architecture
//!
//! - [`signals`]: stateful feature derivation (smoothing, hysteresis, dwell)
//! - [`fusion`]: normalization, gated fusion and level classification
//! - [`workers`]: capacity-1 mailbox workers around external detectors
//! - [`capture`]: clip state machine, detached persistence, clip store
//! - [`enrichment`]: optional HTTP summary for persisted clips
//! - [`feedback`]: offline weight-adjustment reports
//! - [`pipeline`]: the tick loop and the replay driver
//! - [`time`]: clock abstraction
//! - [`app`]: CLI and configuration management
//!
//! ## Tick Pipeline
//!
//! ```text
//! ┌─────────┐   submit   ┌─────────────┐  poll (latest)  ┌──────────────┐
//! │  Frame  │──────────▶│   Workers   │────────────────▶│              │
//! │         │            │ (violence,  │                 │   Signal     │
//! │         │──pose────────────────────────────────────▶│  Derivation  │
//! └─────────┘            └─────────────┘                 └──────┬───────┘
//!                                                               │ bundle
//!                                                               ▼
//! ┌─────────────┐  frames + metadata  ┌─────────────┐    ┌──────────────┐
//! │ Clip writer │◀────────────────────│    Clip     │◀───│   Intent     │
//! │ (detached)  │                     │  Recorder   │    │   Fusion     │
//! └─────────────┘                     └─────────────┘    └──────────────┘
//! ```

pub mod time;
pub mod signals;
pub mod fusion;
pub mod workers;
pub mod capture;
pub mod enrichment;
pub mod feedback;
pub mod pipeline;
pub mod app;

// Re-export commonly used types
pub use capture::{ClipMetadata, ClipRecord, ClipRecorder, ClipState, ClipStore, Frame};
pub use fusion::{IntentEngine, NormalizedSignals, ThreatLevel};
pub use pipeline::{Sentinel, TickReport};
pub use signals::{KeypointSet, SignalBundle, SignalDeriver};
pub use workers::{DetectorWorker, WeaponDetection};

/// Result type alias for the sentinel
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the sentinel
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
