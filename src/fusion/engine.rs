//! Gated weighted fusion

use super::level::{ThreatLevel, Thresholds};
use crate::app::config::FusionConfig;
use crate::signals::{Channel, Ema, SignalBundle};
use serde::Serialize;
use std::collections::BTreeMap;

/// Scale a raw value into [0, 1] by its ceiling. Non-positive ceilings yield 0.
#[inline]
pub fn normalize_value(value: f64, ceiling: f64) -> f64 {
    if !(ceiling > 0.0) || !value.is_finite() {
        return 0.0;
    }
    (value / ceiling).clamp(0.0, 1.0)
}

/// Normalized fusion inputs for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedSignals {
    /// Behavior channels in [0, 1]
    pub channels: BTreeMap<Channel, f64>,
    /// Presence ramp in [0, 1]
    pub presence: f64,
    /// Violence pressure in [0, 1]
    pub violence: f64,
}

impl NormalizedSignals {
    pub fn channel(&self, channel: Channel) -> f64 {
        self.channels.get(&channel).copied().unwrap_or(0.0)
    }
}

/// Result of one fusion step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionOutput {
    /// Smoothed score in [0, 1]
    pub score: f64,
    pub level: ThreatLevel,
    pub normalized: NormalizedSignals,
}

/// Fuses a [`SignalBundle`] into a smoothed score and level
pub struct IntentEngine {
    config: FusionConfig,
    thresholds: Thresholds,
    smoother: Ema,
    score: f64,
    level: ThreatLevel,
}

impl IntentEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            thresholds: Thresholds::from_config(&config),
            smoother: Ema::new(config.intent_alpha),
            score: 0.0,
            level: ThreatLevel::Calm,
            config,
        }
    }

    /// Normalize every input of a bundle
    pub fn normalize(&self, bundle: &SignalBundle) -> NormalizedSignals {
        let channels = Channel::ALL
            .into_iter()
            .map(|c| {
                let ceiling = self.config.ceilings.get(&c).copied().unwrap_or(0.0);
                (c, normalize_value(bundle.channel(c), ceiling))
            })
            .collect();

        NormalizedSignals {
            channels,
            presence: self.presence_ramp(bundle.presence_s),
            violence: normalize_value(bundle.violence_pressure, self.config.violence_ceiling),
        }
    }

    /// Piecewise-linear presence ramp: 0 below min, 1 above max
    pub fn presence_ramp(&self, presence_s: f64) -> f64 {
        let (min, max) = (self.config.presence_ramp_min_s, self.config.presence_ramp_max_s);
        if !presence_s.is_finite() || presence_s < min {
            0.0
        } else if presence_s > max || max <= min {
            1.0
        } else {
            (presence_s - min) / (max - min)
        }
    }

    /// Weighted sum over behavior channels
    pub fn behavior_score(&self, normalized: &NormalizedSignals) -> f64 {
        self.config
            .weights
            .iter()
            .map(|(c, w)| w * normalized.channel(*c))
            .sum()
    }

    /// Unsmoothed fused score, clamped to [0, 1]
    pub fn raw_score(&self, normalized: &NormalizedSignals) -> f64 {
        let behavior = self.behavior_score(normalized);
        let presence_weight =
            self.config.presence_base_weight * (1.0 + behavior * self.config.presence_gating_factor);

        let violence = if behavior > self.config.violence_behavior_floor {
            self.config.violence_weight * normalized.violence
        } else {
            0.0
        };

        (behavior + normalized.presence * presence_weight + violence).clamp(0.0, 1.0)
    }

    /// Fuse one tick
    pub fn update(&mut self, bundle: &SignalBundle) -> FusionOutput {
        let normalized = self.normalize(bundle);
        let raw = self.raw_score(&normalized);

        self.score = self.smoother.update(raw);
        self.level = self.thresholds.classify(self.score);

        FusionOutput {
            score: self.score,
            level: self.level,
            normalized,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn level(&self) -> ThreatLevel {
        self.level
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Forget the smoothed score
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.score = 0.0;
        self.level = ThreatLevel::Calm;
    }
}
