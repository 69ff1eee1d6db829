//! Loitering dwell tracking
//!
//! Three ways to linger: standing still, pacing around a spot, or leaving it.
//! Standing still accumulates dwell at real time; pacing accumulates faster;
//! leaving the spot resets dwell and moves the anchor.

use super::keypoints::Point2;
use serde::{Deserialize, Serialize};

/// How the subject is currently using space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoiteringCategory {
    /// Raw speed below the stationary threshold
    Stationary,
    /// Moving, but still within the radius of the anchor
    Pacing,
    /// Moving and outside the radius; dwell resets
    Displaced,
    /// No centroid has been seen yet
    #[default]
    None,
}

impl std::fmt::Display for LoiteringCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stationary => "STATIONARY",
            Self::Pacing => "PACING",
            Self::Displaced => "DISPLACED",
            Self::None => "NONE",
        };
        f.write_str(s)
    }
}

/// Loitering thresholds
#[derive(Debug, Clone, Copy)]
pub struct LoiteringParams {
    /// Raw speed below which the subject counts as stationary
    pub speed_threshold: f64,
    /// Displacement from the anchor still counted as "in place"
    pub radius: f64,
    /// Dwell seconds before the score starts ramping
    pub time_threshold_s: f64,
    /// Seconds for the score to ramp from 0 to 1
    pub ramp_s: f64,
    /// Dwell multiplier while pacing
    pub pacing_multiplier: f64,
}

/// One tick of loitering output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoiteringReading {
    pub category: LoiteringCategory,
    pub score: f64,
    pub dwell_s: f64,
    pub radius: f64,
}

/// Anchor + dwell clock state machine
#[derive(Debug, Clone)]
pub struct LoiteringTracker {
    params: LoiteringParams,
    anchor: Option<Point2>,
    dwell_s: f64,
    category: LoiteringCategory,
}

impl LoiteringTracker {
    pub fn new(params: LoiteringParams) -> Self {
        Self {
            params,
            anchor: None,
            dwell_s: 0.0,
            category: LoiteringCategory::None,
        }
    }

    /// Advance by one tick of length `dt`.
    ///
    /// `centroid` is the latest known body centroid; `None` means no subject
    /// has been seen since the last reset, which leaves dwell unchanged.
    pub fn update(&mut self, centroid: Option<Point2>, raw_speed: f64, dt: f64) -> LoiteringReading {
        let Some(position) = centroid else {
            self.category = LoiteringCategory::None;
            return self.reading(0.0);
        };

        let anchor = *self.anchor.get_or_insert(position);
        let displacement = anchor.distance(&position);

        self.category = if raw_speed < self.params.speed_threshold {
            self.dwell_s += dt;
            LoiteringCategory::Stationary
        } else if displacement < self.params.radius {
            self.dwell_s += dt * self.params.pacing_multiplier;
            LoiteringCategory::Pacing
        } else {
            self.dwell_s = 0.0;
            self.anchor = Some(position);
            LoiteringCategory::Displaced
        };

        self.reading(displacement)
    }

    /// Score for a given dwell: 0 up to the threshold, then a linear ramp to 1
    pub fn score_for(&self, dwell_s: f64) -> f64 {
        if dwell_s <= self.params.time_threshold_s || self.params.ramp_s <= 0.0 {
            return 0.0;
        }
        ((dwell_s - self.params.time_threshold_s) / self.params.ramp_s).clamp(0.0, 1.0)
    }

    pub fn dwell_s(&self) -> f64 {
        self.dwell_s
    }

    pub fn category(&self) -> LoiteringCategory {
        self.category
    }

    pub fn reset(&mut self) {
        self.anchor = None;
        self.dwell_s = 0.0;
        self.category = LoiteringCategory::None;
    }

    fn reading(&self, radius: f64) -> LoiteringReading {
        LoiteringReading {
            category: self.category,
            score: self.score_for(self.dwell_s),
            dwell_s: self.dwell_s,
            radius,
        }
    }
}
