//! Debounced weapon confirmation with a hold-open cooldown

use super::window::Window;
use crate::workers::WeaponDetection;

/// Boolean ring buffer that confirms only when completely full of `true`
#[derive(Debug, Clone)]
pub struct DebounceBuffer {
    samples: Window<bool>,
}

impl DebounceBuffer {
    pub fn new(frames: usize) -> Self {
        Self {
            samples: Window::new(frames),
        }
    }

    pub fn push(&mut self, present: bool) {
        self.samples.push(present);
    }

    /// True only once the buffer is full and every sample is `true`
    pub fn is_confirmed(&self) -> bool {
        self.samples.is_full() && self.samples.iter().all(|&p| p)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Single optional expiry timestamp. Unarmed after construction or reset.
#[derive(Debug, Clone)]
pub struct CooldownTimer {
    duration_s: f64,
    expiry: Option<f64>,
}

impl CooldownTimer {
    pub fn new(duration_s: f64) -> Self {
        Self {
            duration_s,
            expiry: None,
        }
    }

    /// (Re)arm: expiry = now + duration
    pub fn arm(&mut self, now: f64) {
        self.expiry = Some(now + self.duration_s);
    }

    /// Holds while `now < expiry`
    pub fn is_active(&self, now: f64) -> bool {
        self.expiry.is_some_and(|e| now < e)
    }

    /// Seconds left before expiry, 0 when unarmed or expired
    pub fn remaining(&self, now: f64) -> f64 {
        self.expiry.map_or(0.0, |e| (e - now).max(0.0))
    }

    pub fn clear(&mut self) {
        self.expiry = None;
    }
}

/// Weapon status for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeaponStatus {
    pub confirmed: bool,
    pub cooldown_remaining_s: f64,
    /// Highest detection score seen this tick
    pub score: f64,
}

/// Presence debounce + cooldown for weapon detections
#[derive(Debug, Clone)]
pub struct WeaponConfirmation {
    min_score: f64,
    debounce: DebounceBuffer,
    cooldown: CooldownTimer,
    last_score: f64,
}

impl WeaponConfirmation {
    pub fn new(min_score: f64, debounce_frames: usize, cooldown_s: f64) -> Self {
        Self {
            min_score,
            debounce: DebounceBuffer::new(debounce_frames),
            cooldown: CooldownTimer::new(cooldown_s),
            last_score: 0.0,
        }
    }

    /// Record one tick of detections
    pub fn observe(&mut self, detections: &[WeaponDetection]) {
        let best = detections
            .iter()
            .map(|d| d.score)
            .filter(|s| s.is_finite())
            .fold(0.0_f64, f64::max);
        self.last_score = best;
        self.debounce.push(detections.iter().any(|d| d.score >= self.min_score));
    }

    /// Evaluate at `now`. A raw confirmation re-arms the cooldown.
    pub fn evaluate(&mut self, now: f64) -> WeaponStatus {
        if self.debounce.is_confirmed() {
            self.cooldown.arm(now);
        }
        WeaponStatus {
            confirmed: self.cooldown.is_active(now),
            cooldown_remaining_s: self.cooldown.remaining(now),
            score: self.last_score,
        }
    }

    pub fn reset(&mut self) {
        self.debounce.clear();
        self.cooldown.clear();
        self.last_score = 0.0;
    }
}
