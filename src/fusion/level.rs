//! Discrete threat levels

use crate::app::config::FusionConfig;
use serde::{Deserialize, Serialize};

/// Ordered threat level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    #[default]
    Calm,
    Unusual,
    Suspicious,
    Threat,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Calm => "CALM",
            ThreatLevel::Unusual => "UNUSUAL",
            ThreatLevel::Suspicious => "SUSPICIOUS",
            ThreatLevel::Threat => "THREAT",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band upper bounds: [0, calm) CALM, [calm, unusual) UNUSUAL,
/// [unusual, suspicious) SUSPICIOUS, [suspicious, inf) THREAT
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub calm: f64,
    pub unusual: f64,
    pub suspicious: f64,
}

impl Thresholds {
    pub fn from_config(config: &FusionConfig) -> Self {
        Self {
            calm: config.th_calm,
            unusual: config.th_unusual,
            suspicious: config.th_suspicious,
        }
    }

    /// Map a score to its half-open band
    pub fn classify(&self, score: f64) -> ThreatLevel {
        if score < self.calm {
            ThreatLevel::Calm
        } else if score < self.unusual {
            ThreatLevel::Unusual
        } else if score < self.suspicious {
            ThreatLevel::Suspicious
        } else {
            ThreatLevel::Threat
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from_config(&FusionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        let th = Thresholds::default();
        assert_eq!(th.classify(0.0), ThreatLevel::Calm);
        assert_eq!(th.classify(0.399), ThreatLevel::Calm);
        assert_eq!(th.classify(0.4), ThreatLevel::Unusual);
        assert_eq!(th.classify(0.599), ThreatLevel::Unusual);
        assert_eq!(th.classify(0.6), ThreatLevel::Suspicious);
        assert_eq!(th.classify(0.699), ThreatLevel::Suspicious);
        assert_eq!(th.classify(0.7), ThreatLevel::Threat);
        assert_eq!(th.classify(1.0), ThreatLevel::Threat);
    }

    #[test]
    fn test_classify_is_monotone() {
        let th = Thresholds::default();
        let mut prev = ThreatLevel::Calm;
        for i in 0..=1000 {
            let level = th.classify(i as f64 / 1000.0);
            assert!(level >= prev);
            prev = level;
        }
    }

    #[test]
    fn test_level_ordering_and_display() {
        assert!(ThreatLevel::Calm < ThreatLevel::Unusual);
        assert!(ThreatLevel::Suspicious < ThreatLevel::Threat);
        assert_eq!(ThreatLevel::Suspicious.to_string(), "SUSPICIOUS");
        assert_eq!(serde_json::to_string(&ThreatLevel::Threat).unwrap(), "\"THREAT\"");
    }
}
