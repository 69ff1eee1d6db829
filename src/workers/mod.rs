//! Detector Workers
//!
//! Asynchronous model execution bound to the synchronous tick loop through
//! capacity-1 slots:
//! - [`Detector`] and [`PoseEstimator`] collaborator interfaces
//! - [`Mailbox`], the single-slot exchange
//! - [`DetectorWorker`], the thread wrapper with start/submit/poll/stop/reset

pub mod detector;
pub mod mailbox;
pub mod worker;

pub use detector::{
    boxed_factory, BoundingBox, Detector, DetectorFactory, DynDetector, PoseEstimator,
    ViolenceProbs, WeaponDetection,
};
pub use mailbox::Mailbox;
pub use worker::{DetectorWorker, SubmitPolicy, WorkerHealth, WorkerStats};
