//! Clock sources

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in epoch seconds
pub trait Clock: Send + Sync {
    /// Current time in seconds since the Unix epoch
    fn now(&self) -> f64;
}

/// Reads the operating system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Manually advanced clock.
///
/// Clones share the same underlying time, so a test can hold one handle
/// while the code under test reads another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Create a clock starting at `start` seconds
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, t: f64) {
        *self.now.lock() = t;
    }

    /// Move forward by `dt` seconds
    pub fn advance(&self, dt: f64) {
        *self.now.lock() += dt;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
