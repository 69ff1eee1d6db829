//! Intent Fusion
//!
//! Normalizes the behavior channels, fuses them with a gated presence term
//! and a floor-gated violence term, smooths the result and classifies it
//! into a [`ThreatLevel`].

pub mod engine;
pub mod level;

pub use engine::{normalize_value, FusionOutput, IntentEngine, NormalizedSignals};
pub use level::{ThreatLevel, Thresholds};
