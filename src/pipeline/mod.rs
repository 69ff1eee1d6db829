//! Tick Pipeline
//!
//! - [`Sentinel`]: the per-tick orchestrator and its run loop
//! - [`replay`]: drives the pipeline from a recorded observation log

pub mod replay;
pub mod sentinel;

pub use replay::{
    ReplayScript, ReplaySource, ScriptedPose, ScriptedViolence, ScriptedWeapons, TickRecord,
    REPLAY_WORKER_TIMEOUT,
};
pub use sentinel::{
    DoorbellHandle, FrameSource, RunSummary, Sentinel, SentinelBuilder, TickReport, ViolenceWorker,
    WeaponWorker,
};
