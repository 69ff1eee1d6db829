//! Wall-clock abstraction
//!
//! The tick loop timestamps everything in epoch seconds as `f64`. Production
//! code reads the system clock; tests and the replay driver drive a manual
//! clock so timing properties can be checked tick by tick.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};
