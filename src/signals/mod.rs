//! Signal Derivation
//!
//! Stateful feature extraction from per-tick observations:
//! - Smoothing, windowing and hysteresis primitives
//! - Loitering dwell tracking
//! - Weapon debounce and cooldown
//! - Doorbell pressure
//! - The [`SignalDeriver`] that ties them into a [`SignalBundle`]

pub mod bundle;
pub mod debounce;
pub mod derivation;
pub mod doorbell;
pub mod hysteresis;
pub mod keypoints;
pub mod loitering;
pub mod smoothing;
pub mod window;

pub use bundle::{Channel, SignalBundle};
pub use debounce::{CooldownTimer, DebounceBuffer, WeaponConfirmation, WeaponStatus};
pub use derivation::{SignalDeriver, SignalTraces};
pub use doorbell::DoorbellPressure;
pub use hysteresis::{SignCrossingCounter, StopGoCounter};
pub use keypoints::{KeypointSet, Point2, KEYPOINT_COUNT};
pub use loitering::{LoiteringCategory, LoiteringTracker};
pub use smoothing::Ema;
pub use window::Window;
