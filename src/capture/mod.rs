//! Event Capture
//!
//! Evidence recording driven by the threat level:
//! - [`Frame`], the unit buffered while recording
//! - [`ClipRecorder`], the IDLE/RECORDING/COOLDOWN state machine
//! - [`ClipWriter`], detached persistence through an encoder chain
//! - [`ClipStore`], read access to persisted records

pub mod encoder;
pub mod frame;
pub mod metadata;
pub mod persistence;
pub mod recorder;
pub mod store;

pub use encoder::{ClipEncoder, EncodedVideo, EncoderChain, FfmpegEncoder, Y4mEncoder};
pub use frame::Frame;
pub use metadata::{ClipArtifacts, ClipMetadata, ClipRecord, SignalStat, Transition};
pub use persistence::{ClipSink, ClipWriter};
pub use recorder::{ClipRecorder, ClipState};
pub use store::ClipStore;
