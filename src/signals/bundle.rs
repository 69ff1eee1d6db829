//! Per-tick signal record

use super::loitering::LoiteringCategory;
use serde::{Deserialize, Serialize};

/// Behavior channels that take part in weighted fusion.
///
/// Presence and violence pressure are fused separately and are therefore
/// not channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Velocity,
    MotionEnergy,
    HeadYawRate,
    #[serde(rename = "head_osc")]
    HeadOscillation,
    HandFidget,
    #[serde(rename = "osc_energy")]
    OscillationEnergy,
    HeadDown,
    #[serde(rename = "dir_flip")]
    DirectionFlip,
    StopGo,
    #[serde(rename = "loitering_score")]
    Loitering,
}

impl Channel {
    pub const ALL: [Channel; 10] = [
        Channel::Velocity,
        Channel::MotionEnergy,
        Channel::HeadYawRate,
        Channel::HeadOscillation,
        Channel::HandFidget,
        Channel::OscillationEnergy,
        Channel::HeadDown,
        Channel::DirectionFlip,
        Channel::StopGo,
        Channel::Loitering,
    ];

    /// Signal name, identical to the matching [`SignalBundle`] field
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Velocity => "velocity",
            Channel::MotionEnergy => "motion_energy",
            Channel::HeadYawRate => "head_yaw_rate",
            Channel::HeadOscillation => "head_osc",
            Channel::HandFidget => "hand_fidget",
            Channel::OscillationEnergy => "osc_energy",
            Channel::HeadDown => "head_down",
            Channel::DirectionFlip => "dir_flip",
            Channel::StopGo => "stop_go",
            Channel::Loitering => "loitering_score",
        }
    }

    pub fn from_name(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every derived signal for one tick. Recomputed in full each tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalBundle {
    /// Seconds since the current presence session started
    pub presence_s: f64,
    /// Decaying doorbell press level
    pub doorbell_rings: f64,
    /// Distance from the session's first centroid to the current one
    pub net_disp: f64,
    /// Path length over the window
    pub motion_energy: f64,
    /// Mean smoothed centroid speed over the window
    pub velocity: f64,
    pub head_yaw_rate: f64,
    pub head_osc: u32,
    /// Fraction of window ticks with the nose below the shoulder line
    pub head_down: f64,
    pub dir_flip: u32,
    pub osc_energy: f64,
    pub stop_go: u32,
    pub hand_fidget: f64,
    pub violence_pressure: f64,
    pub loitering_score: f64,
    pub loitering_type: LoiteringCategory,
    pub loitering_time: f64,
    pub loitering_radius: f64,
    pub weapon_confirmed: bool,
    /// Seconds until the weapon confirmation lapses
    pub weapon_cooldown: f64,
    /// Highest weapon detection score this tick
    pub weapon_score: f64,
}

/// Number of entries in [`SignalBundle::numeric`]
pub const NUMERIC_SIGNAL_COUNT: usize = 19;

impl SignalBundle {
    /// Value of a fusion channel
    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Velocity => self.velocity,
            Channel::MotionEnergy => self.motion_energy,
            Channel::HeadYawRate => self.head_yaw_rate,
            Channel::HeadOscillation => f64::from(self.head_osc),
            Channel::HandFidget => self.hand_fidget,
            Channel::OscillationEnergy => self.osc_energy,
            Channel::HeadDown => self.head_down,
            Channel::DirectionFlip => f64::from(self.dir_flip),
            Channel::StopGo => f64::from(self.stop_go),
            Channel::Loitering => self.loitering_score,
        }
    }

    /// Numeric view for aggregation: booleans as 0/1, the category excluded
    pub fn numeric(&self) -> [(&'static str, f64); NUMERIC_SIGNAL_COUNT] {
        [
            ("presence_s", self.presence_s),
            ("doorbell_rings", self.doorbell_rings),
            ("net_disp", self.net_disp),
            ("motion_energy", self.motion_energy),
            ("velocity", self.velocity),
            ("head_yaw_rate", self.head_yaw_rate),
            ("head_osc", f64::from(self.head_osc)),
            ("head_down", self.head_down),
            ("dir_flip", f64::from(self.dir_flip)),
            ("osc_energy", self.osc_energy),
            ("stop_go", f64::from(self.stop_go)),
            ("hand_fidget", self.hand_fidget),
            ("violence_pressure", self.violence_pressure),
            ("loitering_score", self.loitering_score),
            ("loitering_time", self.loitering_time),
            ("loitering_radius", self.loitering_radius),
            ("weapon_confirmed", if self.weapon_confirmed { 1.0 } else { 0.0 }),
            ("weapon_cooldown", self.weapon_cooldown),
            ("weapon_score", self.weapon_score),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_name(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::from_name("presence_s"), None);
    }

    #[test]
    fn test_channel_serde_matches_as_str() {
        for channel in Channel::ALL {
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.as_str()));
        }
    }

    #[test]
    fn test_channel_names_are_bundle_fields() {
        let bundle = SignalBundle::default();
        let json = serde_json::to_value(&bundle).unwrap();
        for channel in Channel::ALL {
            assert!(json.get(channel.as_str()).is_some(), "missing {}", channel);
        }
    }

    #[test]
    fn test_numeric_view_excludes_category() {
        let bundle = SignalBundle {
            weapon_confirmed: true,
            head_osc: 3,
            ..Default::default()
        };
        let numeric = bundle.numeric();
        assert!(numeric.iter().all(|(name, _)| *name != "loitering_type"));
        assert!(numeric.contains(&("weapon_confirmed", 1.0)));
        assert!(numeric.contains(&("head_osc", 3.0)));
    }

    #[test]
    fn test_channel_accessor() {
        let bundle = SignalBundle {
            dir_flip: 2,
            loitering_score: 0.5,
            ..Default::default()
        };
        assert_eq!(bundle.channel(Channel::DirectionFlip), 2.0);
        assert_eq!(bundle.channel(Channel::Loitering), 0.5);
    }

    #[test]
    fn test_loitering_type_serializes_upper() {
        let bundle = SignalBundle::default();
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["loitering_type"], "NONE");
    }
}
