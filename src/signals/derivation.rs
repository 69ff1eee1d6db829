//! Signal Derivation
//!
//! Turns per-tick observations into a [`SignalBundle`]. Every call to
//! [`SignalDeriver::update`] or [`SignalDeriver::update_empty`] advances each
//! raw-feature window by exactly one sample; [`SignalDeriver::compute`] then
//! derives the bundle from the window contents plus the dwell, weapon,
//! violence and doorbell state.
//!
//! State falls into two groups:
//! - subject state (windows, smoothers, centroid and wrist memory,
//!   loitering), cleared when presence times out;
//! - frame state (weapon debounce and cooldown, violence smoother, doorbell),
//!   cleared only by [`SignalDeriver::reset`].

use super::bundle::SignalBundle;
use super::debounce::WeaponConfirmation;
use super::doorbell::DoorbellPressure;
use super::hysteresis::{SignCrossingCounter, StopGoCounter};
use super::keypoints::{KeypointSet, Point2};
use super::loitering::{LoiteringParams, LoiteringTracker};
use super::smoothing::Ema;
use super::window::{mean_abs_diff, Window};
use crate::app::config::{PipelineConfig, SignalConfig};
use crate::workers::{ViolenceProbs, WeaponDetection};
use serde::Serialize;
use tracing::{debug, warn};

/// Raw window contents for plotting, oldest first
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignalTraces {
    pub velocity: Vec<f64>,
    pub head_yaw: Vec<f64>,
    pub hand_energy: Vec<f64>,
    pub violence_p0: Vec<f64>,
    pub violence_p1: Vec<f64>,
}

/// Stateful feature derivation for a single subject
pub struct SignalDeriver {
    config: SignalConfig,
    dt: f64,

    // Subject windows
    speed: Window<f64>,
    dx: Window<f64>,
    head_yaw: Window<f64>,
    head_down: Window<bool>,
    hand_energy: Window<f64>,

    // Smoothers
    speed_ema: Ema,
    head_yaw_ema: Ema,
    hand_ema: Ema,
    violence_ema: Ema,

    // Subject memory
    first_centroid: Option<Point2>,
    last_centroid: Option<Point2>,
    prev_wrists: Option<[Point2; 2]>,
    last_raw_speed: f64,
    loitering: LoiteringTracker,

    // Presence session
    session_start: Option<f64>,
    last_detection: Option<f64>,
    subject_cleared: bool,

    // Frame-level state
    violence_p0: Window<f64>,
    violence_p1: Window<f64>,
    prev_violence: Option<f64>,
    weapon: WeaponConfirmation,
    doorbell: DoorbellPressure,

    head_osc: SignCrossingCounter,
    dir_flip: SignCrossingCounter,
    stop_go: StopGoCounter,
}

impl SignalDeriver {
    /// Create a deriver with the given timing and signal settings
    pub fn new(pipeline: &PipelineConfig, config: SignalConfig) -> Self {
        let window = pipeline.window;
        let loitering = LoiteringTracker::new(LoiteringParams {
            speed_threshold: config.loitering_speed_threshold,
            radius: config.loitering_radius,
            time_threshold_s: config.loitering_time_threshold_s,
            ramp_s: config.loitering_ramp_s,
            pacing_multiplier: config.pacing_dwell_multiplier,
        });

        Self {
            dt: pipeline.dt(),
            speed: Window::new(window),
            dx: Window::new(window),
            head_yaw: Window::new(window),
            head_down: Window::new(window),
            hand_energy: Window::new(window),
            speed_ema: Ema::new(config.ema_alpha),
            head_yaw_ema: Ema::new(config.ema_alpha),
            hand_ema: Ema::new(config.ema_alpha),
            violence_ema: Ema::new(config.violence_ema_alpha),
            first_centroid: None,
            last_centroid: None,
            prev_wrists: None,
            last_raw_speed: 0.0,
            loitering,
            session_start: None,
            last_detection: None,
            subject_cleared: false,
            violence_p0: Window::new(window),
            violence_p1: Window::new(window),
            prev_violence: None,
            weapon: WeaponConfirmation::new(
                config.weapon_min_score,
                config.weapon_debounce_frames,
                config.weapon_cooldown_s,
            ),
            doorbell: DoorbellPressure::new(config.doorbell_min_interval_s, config.doorbell_decay_per_s),
            head_osc: SignCrossingCounter::new(config.head_yaw_hysteresis),
            dir_flip: SignCrossingCounter::new(config.centroid_dx_hysteresis),
            stop_go: StopGoCounter::new(config.stop_threshold, config.resume_ratio),
            config,
        }
    }

    /// Ingest a tick with a detected subject
    pub fn update(
        &mut self,
        keypoints: &KeypointSet,
        now: f64,
        violence: ViolenceProbs,
        weapons: &[WeaponDetection],
    ) {
        self.observe_frame(violence, weapons);

        let centroid = keypoints.hip_mid();
        self.first_centroid.get_or_insert(centroid);

        // dx only exists between two sightings; it is never padded
        let raw_speed = match self.last_centroid {
            Some(prev) => {
                self.dx.push(centroid.x - prev.x);
                centroid.distance(&prev) / self.dt
            }
            None => 0.0,
        };
        self.last_centroid = Some(centroid);
        self.last_raw_speed = raw_speed;

        self.speed.push(self.speed_ema.update(raw_speed));

        let nose = keypoints.nose();
        let shoulders = keypoints.shoulder_mid();
        self.head_yaw.push(self.head_yaw_ema.update(nose.x - shoulders.x));
        self.head_down.push(nose.y > shoulders.y);

        let wrists = keypoints.wrists();
        let energy = self.prev_wrists.map_or(0.0, |prev| {
            wrists[0].distance(&prev[0]) + wrists[1].distance(&prev[1])
        });
        self.prev_wrists = Some(wrists);
        self.hand_energy.push(self.hand_ema.update(energy));

        self.last_detection = Some(now);
        self.subject_cleared = false;
    }

    /// Ingest a tick with no subject. Windows advance with neutral samples,
    /// except the dx window which only holds real displacements. Smoothers
    /// and the last known centroid are left untouched.
    pub fn update_empty(&mut self, violence: ViolenceProbs, weapons: &[WeaponDetection]) {
        self.observe_frame(violence, weapons);

        self.last_raw_speed = 0.0;
        self.speed.push(0.0);
        self.head_yaw.push(0.0);
        self.head_down.push(false);
        self.hand_energy.push(0.0);
    }

    /// Derive the full bundle at `now`
    pub fn compute(&mut self, now: f64) -> SignalBundle {
        let presence_s = self.advance_presence(now);

        let net_disp = match (self.first_centroid, self.last_centroid) {
            (Some(first), Some(last)) => first.distance(&last),
            _ => 0.0,
        };

        let osc_energy = mean_abs_diff(self.dx.iter().map(|&d| signum(d)));
        let head_down = if self.head_down.is_empty() {
            0.0
        } else {
            self.head_down.iter().filter(|&&d| d).count() as f64 / self.head_down.len() as f64
        };

        let loitering = self
            .loitering
            .update(self.last_centroid, self.last_raw_speed, self.dt);
        let violence_pressure = self.violence_pressure();
        let weapon = self.weapon.evaluate(now);
        let doorbell_rings = self.doorbell.decay(self.dt);

        SignalBundle {
            presence_s: guard("presence_s", presence_s),
            doorbell_rings: guard("doorbell_rings", doorbell_rings),
            net_disp: guard("net_disp", net_disp),
            motion_energy: guard("motion_energy", self.speed.sum() * self.dt),
            velocity: guard("velocity", self.speed.mean()),
            head_yaw_rate: guard("head_yaw_rate", self.head_yaw.mean_abs_diff()),
            head_osc: self.head_osc.count(self.head_yaw.iter().copied()),
            head_down: guard("head_down", head_down),
            dir_flip: self.dir_flip.count(self.dx.iter().copied()),
            osc_energy: guard("osc_energy", osc_energy),
            stop_go: self.stop_go.count(self.speed.iter().copied()),
            hand_fidget: guard("hand_fidget", self.hand_energy.mean_abs_diff()),
            violence_pressure: guard("violence_pressure", violence_pressure),
            loitering_score: guard("loitering_score", loitering.score),
            loitering_type: loitering.category,
            loitering_time: guard("loitering_time", loitering.dwell_s),
            loitering_radius: guard("loitering_radius", loitering.radius),
            weapon_confirmed: weapon.confirmed,
            weapon_cooldown: guard("weapon_cooldown", weapon.cooldown_remaining_s),
            weapon_score: guard("weapon_score", weapon.score),
        }
    }

    /// Register an out-of-band doorbell press. Returns whether it was accepted.
    pub fn trigger_doorbell(&mut self, now: f64) -> bool {
        let accepted = self.doorbell.trigger(now);
        if accepted {
            debug!(rings = self.doorbell.rings(), "Doorbell press accepted");
        }
        accepted
    }

    /// Window contents for plotting
    pub fn traces(&self) -> SignalTraces {
        SignalTraces {
            velocity: self.speed.to_vec(),
            head_yaw: self.head_yaw.to_vec(),
            hand_energy: self.hand_energy.to_vec(),
            violence_p0: self.violence_p0.to_vec(),
            violence_p1: self.violence_p1.to_vec(),
        }
    }

    /// Number of samples currently held in each raw-feature window
    pub fn window_len(&self) -> usize {
        self.speed.len()
    }

    /// Clear all state, subject and frame level
    pub fn reset(&mut self) {
        self.clear_subject();
        self.session_start = None;
        self.last_detection = None;
        self.subject_cleared = false;

        self.violence_p0.clear();
        self.violence_p1.clear();
        self.violence_ema.reset();
        self.prev_violence = None;
        self.weapon.reset();
        self.doorbell.reset();
    }

    fn observe_frame(&mut self, violence: ViolenceProbs, weapons: &[WeaponDetection]) {
        self.weapon.observe(weapons);
        self.violence_p0.push(violence.get(0));
        self.violence_p1.push(violence.get(1));
        let p = violence.get(self.config.violence_class_index);
        if p.is_finite() {
            self.violence_ema.update(p);
        }
    }

    fn violence_pressure(&mut self) -> f64 {
        let Some(p) = self.violence_ema.value() else {
            return 0.0;
        };
        let base = (p - self.config.violence_baseline).max(0.0) * self.config.violence_gain;
        let slope = self
            .prev_violence
            .map_or(0.0, |prev| (p - prev).max(0.0) * self.config.violence_slope_gain);
        self.prev_violence = Some(p);
        base + slope
    }

    /// Returns presence seconds, restarting the session after a long gap
    fn advance_presence(&mut self, now: f64) -> f64 {
        let start = *self.session_start.get_or_insert(now);
        let last = *self.last_detection.get_or_insert(now);

        if now - last > self.config.presence_reset_timeout_s {
            self.session_start = Some(now);
            if !self.subject_cleared {
                debug!(gap_s = now - last, "Presence timed out, clearing subject state");
                self.clear_subject();
                self.subject_cleared = true;
            }
            return 0.0;
        }

        (now - start).max(0.0)
    }

    fn clear_subject(&mut self) {
        self.speed.clear();
        self.dx.clear();
        self.head_yaw.clear();
        self.head_down.clear();
        self.hand_energy.clear();
        self.speed_ema.reset();
        self.head_yaw_ema.reset();
        self.hand_ema.reset();
        self.first_centroid = None;
        self.last_centroid = None;
        self.prev_wrists = None;
        self.last_raw_speed = 0.0;
        self.loitering.reset();
    }
}

/// Sign with zero mapped to zero
#[inline]
fn signum(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Replace a non-finite derivation with 0
#[inline]
fn guard(name: &'static str, value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(signal = name, value = %value, "Non-finite signal replaced with 0");
        0.0
    }
}
