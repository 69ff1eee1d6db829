//! Configuration Management
//!
//! Every tunable constant of the watch loop lives here as an explicit value.
//! Components receive their section at construction and never read ambient
//! state; the feedback analyzer works on its own clone.

use crate::signals::Channel;
use crate::workers::SubmitPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Environment variable that disables clip capture entirely
pub const ENV_NO_LOGS: &str = "SENTINEL_NO_LOGS";
/// Environment variable overriding the log directory
pub const ENV_LOG_DIR: &str = "SENTINEL_LOG_DIR";
/// Environment variable overriding the enrichment endpoint
pub const ENV_ENRICH_URL: &str = "SENTINEL_ENRICH_URL";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Tick timing
    pub pipeline: PipelineConfig,
    /// Signal derivation settings
    pub signals: SignalConfig,
    /// Fusion weights and thresholds
    pub fusion: FusionConfig,
    /// Clip capture settings
    pub capture: CaptureConfig,
    /// Detector worker settings
    pub workers: WorkerConfig,
    /// Clip enrichment settings
    pub enrichment: EnrichmentConfig,
}

/// Tick timing configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal ticks per second
    pub fps: f64,
    /// Sliding window length in ticks
    pub window: usize,
}

impl PipelineConfig {
    /// Nominal tick period in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.fps
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            window: 30,
        }
    }
}

/// Signal derivation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Smoothing factor for speed, head yaw and hand energy
    pub ema_alpha: f64,
    /// Dead band for head-yaw oscillation counting
    pub head_yaw_hysteresis: f64,
    /// Dead band for horizontal direction reversal counting
    pub centroid_dx_hysteresis: f64,
    /// Smoothed speed below which the subject counts as stopped
    pub stop_threshold: f64,
    /// Multiple of `stop_threshold` required to resume
    pub resume_ratio: f64,
    /// Dwell seconds before the loitering score starts ramping
    pub loitering_time_threshold_s: f64,
    /// Seconds over which the loitering score ramps from 0 to 1
    pub loitering_ramp_s: f64,
    /// Displacement from the anchor still considered "in place"
    pub loitering_radius: f64,
    /// Raw speed below which the subject counts as stationary
    pub loitering_speed_threshold: f64,
    /// Dwell accumulation multiplier while pacing
    pub pacing_dwell_multiplier: f64,
    /// Seconds without a detection before the presence session restarts
    pub presence_reset_timeout_s: f64,
    /// Smoothing factor for the violence probability
    pub violence_ema_alpha: f64,
    /// Index of the violence class in the probability pair
    pub violence_class_index: usize,
    /// Probability baseline below which no pressure builds
    pub violence_baseline: f64,
    /// Gain on the probability above baseline
    pub violence_gain: f64,
    /// Gain on the positive probability slope
    pub violence_slope_gain: f64,
    /// Minimum detection score counted as "weapon present"
    pub weapon_min_score: f64,
    /// Consecutive present ticks required for confirmation
    pub weapon_debounce_frames: usize,
    /// Seconds a confirmation stays asserted
    pub weapon_cooldown_s: f64,
    /// Minimum seconds between accepted doorbell presses
    pub doorbell_min_interval_s: f64,
    /// Doorbell rings lost per second
    pub doorbell_decay_per_s: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.6,
            head_yaw_hysteresis: 0.02,
            centroid_dx_hysteresis: 0.005,
            stop_threshold: 0.2,
            resume_ratio: 1.5,
            loitering_time_threshold_s: 4.0,
            loitering_ramp_s: 5.0,
            loitering_radius: 0.3,
            loitering_speed_threshold: 0.03,
            pacing_dwell_multiplier: 2.0,
            presence_reset_timeout_s: 2.0,
            violence_ema_alpha: 0.1,
            violence_class_index: 0,
            violence_baseline: 0.1,
            violence_gain: 2.0,
            violence_slope_gain: 1.0,
            weapon_min_score: 0.6,
            weapon_debounce_frames: 3,
            weapon_cooldown_s: 20.0,
            doorbell_min_interval_s: 0.2,
            doorbell_decay_per_s: 0.5,
        }
    }
}

/// Fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Normalization ceiling per behavior channel
    pub ceilings: BTreeMap<Channel, f64>,
    /// Fusion weight per behavior channel
    pub weights: BTreeMap<Channel, f64>,
    /// Normalization ceiling for violence pressure
    pub violence_ceiling: f64,
    /// Fusion weight for violence pressure
    pub violence_weight: f64,
    /// Behavior score that must be exceeded before violence pressure counts
    pub violence_behavior_floor: f64,
    /// Presence weight before gating
    pub presence_base_weight: f64,
    /// Presence seconds where the ramp starts
    pub presence_ramp_min_s: f64,
    /// Presence seconds where the ramp saturates
    pub presence_ramp_max_s: f64,
    /// How strongly behavior amplifies the presence weight
    pub presence_gating_factor: f64,
    /// Smoothing factor for the fused score
    pub intent_alpha: f64,
    /// Upper bound of CALM
    pub th_calm: f64,
    /// Upper bound of UNUSUAL
    pub th_unusual: f64,
    /// Upper bound of SUSPICIOUS
    pub th_suspicious: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        let ceilings = BTreeMap::from([
            (Channel::Velocity, 2.0),
            (Channel::MotionEnergy, 2.0),
            (Channel::HeadYawRate, 0.5),
            (Channel::HeadOscillation, 5.0),
            (Channel::HandFidget, 0.2),
            (Channel::OscillationEnergy, 1.0),
            (Channel::HeadDown, 1.0),
            (Channel::DirectionFlip, 5.0),
            (Channel::StopGo, 5.0),
            (Channel::Loitering, 1.0),
        ]);
        let weights = BTreeMap::from([
            (Channel::Velocity, 0.1),
            (Channel::MotionEnergy, 0.1),
            (Channel::HeadYawRate, 0.1),
            (Channel::HeadOscillation, 0.1),
            (Channel::HandFidget, 0.1),
            (Channel::OscillationEnergy, 0.1),
            (Channel::HeadDown, 0.1),
            (Channel::DirectionFlip, 0.1),
            (Channel::StopGo, 0.05),
            (Channel::Loitering, 0.25),
        ]);

        Self {
            ceilings,
            weights,
            violence_ceiling: 1.0,
            violence_weight: 0.2,
            violence_behavior_floor: 0.05,
            presence_base_weight: 0.1,
            presence_ramp_min_s: 20.0,
            presence_ramp_max_s: 60.0,
            presence_gating_factor: 2.0,
            intent_alpha: 0.1,
            th_calm: 0.4,
            th_unusual: 0.6,
            th_suspicious: 0.7,
        }
    }
}

/// Clip capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Fused score that starts a recording
    pub trigger_score: f64,
    /// Fixed clip length in seconds
    pub clip_duration_s: f64,
    /// Seconds after a clip during which no new recording starts
    pub cooldown_s: f64,
    /// Lowest playback rate written to a clip
    pub min_playback_fps: f64,
    /// Root directory for clips, metadata and learning reports
    pub log_dir: PathBuf,
    /// Disable the capture state machine entirely
    pub disabled: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            trigger_score: 0.6,
            clip_duration_s: 60.0,
            cooldown_s: 60.0,
            min_playback_fps: 1.0,
            log_dir: Config::data_dir().join("logs"),
            disabled: false,
        }
    }
}

/// Detector worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Input wait timeout; also the stop-flag polling interval
    pub input_timeout_ms: u64,
    /// What happens when a frame arrives while the input slot is occupied
    pub submit_policy: SubmitPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            input_timeout_ms: 100,
            submit_policy: SubmitPolicy::DropNewest,
        }
    }
}

/// Clip enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Summary endpoint; enrichment is off when unset
    pub endpoint: Option<String>,
    /// Environment variable holding a bearer token for the endpoint
    pub token_env: String,
    /// Per-request timeout in seconds
    pub timeout_s: u64,
    /// Attempts before giving up
    pub max_retries: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token_env: "SENTINEL_ENRICH_TOKEN".to_string(),
            timeout_s: 60,
            max_retries: 3,
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(self.pipeline.fps > 0.0) {
            return Err(crate::Error::Config(format!(
                "fps must be > 0, got {}", self.pipeline.fps
            )));
        }
        if self.pipeline.window < 2 {
            return Err(crate::Error::Config(format!(
                "window must be >= 2, got {}", self.pipeline.window
            )));
        }

        let s = &self.signals;
        for (name, alpha) in [("ema_alpha", s.ema_alpha), ("violence_ema_alpha", s.violence_ema_alpha), ("intent_alpha", self.fusion.intent_alpha)] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(crate::Error::Config(format!(
                    "{} must be in (0, 1], got {}", name, alpha
                )));
            }
        }
        if s.resume_ratio < 1.0 {
            return Err(crate::Error::Config(format!(
                "resume_ratio must be >= 1, got {}", s.resume_ratio
            )));
        }
        if s.loitering_ramp_s <= 0.0 {
            return Err(crate::Error::Config("loitering_ramp_s must be > 0".to_string()));
        }
        if s.violence_class_index > 1 {
            return Err(crate::Error::Config(format!(
                "violence_class_index must be 0 or 1, got {}", s.violence_class_index
            )));
        }
        if s.weapon_debounce_frames == 0 {
            return Err(crate::Error::Config("weapon_debounce_frames must be > 0".to_string()));
        }

        let f = &self.fusion;
        if !(0.0 < f.th_calm && f.th_calm < f.th_unusual && f.th_unusual < f.th_suspicious && f.th_suspicious <= 1.0) {
            return Err(crate::Error::Config(format!(
                "thresholds must satisfy 0 < calm < unusual < suspicious <= 1, got {} / {} / {}",
                f.th_calm, f.th_unusual, f.th_suspicious
            )));
        }
        if f.presence_ramp_min_s >= f.presence_ramp_max_s {
            return Err(crate::Error::Config(format!(
                "presence ramp must satisfy min < max, got {} / {}",
                f.presence_ramp_min_s, f.presence_ramp_max_s
            )));
        }
        if let Some((channel, w)) = f.weights.iter().find(|(_, w)| **w < 0.0) {
            return Err(crate::Error::Config(format!(
                "weight for {} must be >= 0, got {}", channel, w
            )));
        }
        if f.violence_weight < 0.0 || f.presence_base_weight < 0.0 || f.presence_gating_factor < 0.0 {
            return Err(crate::Error::Config(
                "violence_weight, presence_base_weight and presence_gating_factor must be >= 0".to_string(),
            ));
        }

        let c = &self.capture;
        if c.clip_duration_s <= 0.0 {
            return Err(crate::Error::Config("clip_duration_s must be > 0".to_string()));
        }
        if c.cooldown_s < 0.0 {
            return Err(crate::Error::Config("cooldown_s must be >= 0".to_string()));
        }
        if c.min_playback_fps <= 0.0 {
            return Err(crate::Error::Config("min_playback_fps must be > 0".to_string()));
        }
        if self.workers.input_timeout_ms == 0 {
            return Err(crate::Error::Config("input_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(ENV_NO_LOGS) {
            self.capture.disabled = matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Ok(dir) = std::env::var(ENV_LOG_DIR) {
            if !dir.trim().is_empty() {
                self.capture.log_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var(ENV_ENRICH_URL) {
            if !url.trim().is_empty() {
                self.enrichment.endpoint = Some(url);
            }
        }
    }

    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Per-user data directory
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".intent_sentinel"))
            .unwrap_or_else(|| PathBuf::from(".intent_sentinel"))
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Look up a dotted key such as `fusion.th_calm`
    pub fn get_value(&self, key: &str) -> Result<Option<toml::Value>, crate::Error> {
        let root = toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        let mut current = &root;
        for part in key.split('.') {
            match current.get(part) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current.clone()))
    }
}
