//! Doorbell pressure counter

/// Press counter with a software debounce and linear decay
#[derive(Debug, Clone)]
pub struct DoorbellPressure {
    min_interval_s: f64,
    decay_per_s: f64,
    rings: f64,
    last_accepted: Option<f64>,
}

impl DoorbellPressure {
    pub fn new(min_interval_s: f64, decay_per_s: f64) -> Self {
        Self {
            min_interval_s,
            decay_per_s,
            rings: 0.0,
            last_accepted: None,
        }
    }

    /// Register a press. Returns whether it was accepted; a press must come
    /// strictly more than `min_interval_s` after the last accepted one.
    pub fn trigger(&mut self, now: f64) -> bool {
        let accepted = self
            .last_accepted
            .map_or(true, |last| now - last > self.min_interval_s);
        if accepted {
            self.rings += 1.0;
            self.last_accepted = Some(now);
        }
        accepted
    }

    /// Decay toward zero by one step of `dt` and return the new level
    pub fn decay(&mut self, dt: f64) -> f64 {
        if dt > 0.0 {
            self.rings = (self.rings - self.decay_per_s * dt).max(0.0);
        }
        self.rings
    }

    pub fn rings(&self) -> f64 {
        self.rings
    }

    pub fn reset(&mut self) {
        self.rings = 0.0;
        self.last_accepted = None;
    }
}
