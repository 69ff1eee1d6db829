//! Tick orchestrator
//!
//! [`Sentinel`] owns every tick-local component and calls them in a fixed
//! order:
//!
//! 1. drain doorbell presses
//! 2. submit the frame to both workers (never blocks)
//! 3. poll both workers, holding the previous value when nothing new arrived.
//!    In lockstep mode (replay) the poll waits for this frame's result, so a
//!    recorded session gives the same output on every run.
//! 4. run the pose estimator inline
//! 5. `SignalDeriver::update` / `update_empty`, then `compute`
//! 6. `IntentEngine::update`
//! 7. `ClipRecorder::update_state`, then `update_frame`

use crate::app::config::Config;
use crate::capture::{ClipRecorder, ClipSink, ClipState, ClipWriter, Frame};
use crate::enrichment;
use crate::fusion::{IntentEngine, NormalizedSignals, ThreatLevel};
use crate::signals::{SignalBundle, SignalDeriver};
use crate::time::Clock;
use crate::workers::{
    Detector, DetectorFactory, DetectorWorker, DynDetector, PoseEstimator, ViolenceProbs, WeaponDetection,
    WorkerHealth,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Worker running the action classifier
pub type ViolenceWorker = DetectorWorker<DynDetector<ViolenceProbs>>;
/// Worker running the object detector
pub type WeaponWorker = DetectorWorker<DynDetector<Vec<WeaponDetection>>>;

/// Out-of-band doorbell button. Presses are counted atomically and drained
/// at the start of the next tick.
#[derive(Debug, Clone, Default)]
pub struct DoorbellHandle {
    presses: Arc<AtomicU64>,
}

impl DoorbellHandle {
    /// Register one press; callable from any thread
    pub fn press(&self) {
        self.presses.fetch_add(1, Ordering::AcqRel);
    }

    /// Presses waiting for the next tick
    pub fn pending(&self) -> u64 {
        self.presses.load(Ordering::Acquire)
    }

    fn drain(&self) -> u64 {
        self.presses.swap(0, Ordering::AcqRel)
    }
}

/// Everything produced by one tick
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub seq: u64,
    pub now: f64,
    pub bundle: SignalBundle,
    pub score: f64,
    pub level: ThreatLevel,
    pub normalized: NormalizedSignals,
    pub clip_state: ClipState,
}

/// Source of frames for [`Sentinel::run`]
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub max_score: f64,
    pub max_level: ThreatLevel,
    pub clips: u64,
    /// Whether the stop flag ended the run before the source ran dry
    pub interrupted: bool,
}

/// Single-camera intent pipeline
pub struct Sentinel {
    deriver: SignalDeriver,
    engine: IntentEngine,
    recorder: ClipRecorder,
    pose: Option<Box<dyn PoseEstimator>>,
    violence: Option<ViolenceWorker>,
    weapons: Option<WeaponWorker>,
    last_violence: ViolenceProbs,
    last_weapons: Vec<WeaponDetection>,
    doorbell: DoorbellHandle,
    dt: f64,
    ticks: u64,
    last_level: ThreatLevel,
    lockstep: Option<Duration>,
}

impl Sentinel {
    pub fn builder(config: &Config) -> SentinelBuilder {
        SentinelBuilder::new(config)
    }

    /// Pipeline with no pose estimator and no workers; every tick is empty.
    /// Clips go to the configured log directory.
    pub fn without_detectors(config: &Config) -> Self {
        let sink = Arc::new(default_writer(config));
        Self::assemble(config, sink, None, None, None)
    }

    fn assemble(
        config: &Config,
        sink: Arc<dyn ClipSink>,
        pose: Option<Box<dyn PoseEstimator>>,
        violence: Option<ViolenceWorker>,
        weapons: Option<WeaponWorker>,
    ) -> Self {
        Self {
            deriver: SignalDeriver::new(&config.pipeline, config.signals.clone()),
            engine: IntentEngine::new(config.fusion.clone()),
            recorder: ClipRecorder::new(&config.capture, sink),
            pose,
            violence,
            weapons,
            last_violence: ViolenceProbs::default(),
            last_weapons: Vec::new(),
            doorbell: DoorbellHandle::default(),
            dt: config.pipeline.dt(),
            ticks: 0,
            last_level: ThreatLevel::Calm,
            lockstep: None,
        }
    }

    /// Run one tick. Never fails; collaborator errors degrade to absent input.
    pub fn tick(&mut self, frame: Frame, now: f64) -> TickReport {
        let seq = frame.seq();

        for _ in 0..self.doorbell.drain() {
            self.deriver.trigger_doorbell(now);
        }

        if let Some(w) = &self.violence {
            if let Some(probs) = exchange(w, &frame, self.lockstep) {
                self.last_violence = probs;
            }
        }
        if let Some(w) = &self.weapons {
            if let Some(dets) = exchange(w, &frame, self.lockstep) {
                self.last_weapons = dets;
            }
        }

        let keypoints = match self.pose.as_mut().map(|p| p.estimate(&frame)) {
            Some(Ok(kp)) => kp,
            Some(Err(e)) => {
                warn!(seq, error = %e, "Pose estimation failed, treating tick as empty");
                None
            }
            None => None,
        };

        match &keypoints {
            Some(kp) => self.deriver.update(kp, now, self.last_violence, &self.last_weapons),
            None => self.deriver.update_empty(self.last_violence, &self.last_weapons),
        }

        let bundle = self.deriver.compute(now);
        let fused = self.engine.update(&bundle);

        self.recorder
            .update_state(fused.level, fused.score, &bundle, bundle.weapon_confirmed, now);
        self.recorder.update_frame(frame, now);

        if fused.level != self.last_level {
            info!(seq, from = %self.last_level, to = %fused.level, score = fused.score, "Threat level changed");
            self.last_level = fused.level;
        }
        trace!(seq, score = fused.score, level = %fused.level, subject = keypoints.is_some(), "Tick");
        self.ticks += 1;

        TickReport {
            seq,
            now,
            bundle,
            score: fused.score,
            level: fused.level,
            normalized: fused.normalized,
            clip_state: self.recorder.state(),
        }
    }

    /// Drive ticks from `source` until it runs dry or `stop` is set.
    ///
    /// With `realtime`, each tick is padded to the nominal tick period.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        clock: &dyn Clock,
        stop: &AtomicBool,
        realtime: bool,
    ) -> RunSummary {
        let period = Duration::from_secs_f64(self.dt);
        let clips_before = self.recorder.clips_finalized();
        let mut summary = RunSummary::default();

        loop {
            if stop.load(Ordering::Acquire) {
                summary.interrupted = true;
                info!(ticks = summary.ticks, "Stop requested");
                break;
            }
            let started = Instant::now();
            let Some(frame) = source.next_frame() else {
                break;
            };

            let report = self.tick(frame, clock.now());
            summary.ticks += 1;
            summary.max_score = summary.max_score.max(report.score);
            summary.max_level = summary.max_level.max(report.level);

            if realtime {
                if let Some(rest) = period.checked_sub(started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        }

        summary.clips = self.recorder.clips_finalized() - clips_before;
        summary
    }

    /// Clear all derived state and restart the workers. The first worker
    /// error is returned after everything else has been reset.
    pub fn reset(&mut self) -> crate::Result<()> {
        self.deriver.reset();
        self.engine.reset();
        self.recorder.reset();
        self.last_violence = ViolenceProbs::default();
        self.last_weapons.clear();
        self.doorbell.drain();
        self.last_level = ThreatLevel::Calm;

        let violence = self.violence.as_mut().map_or(Ok(()), |w| w.reset());
        let weapons = self.weapons.as_mut().map_or(Ok(()), |w| w.reset());
        debug!("Pipeline reset");
        violence.and(weapons)
    }

    /// Stop the workers and wait for pending clip writes
    pub fn shutdown(&mut self) {
        if let Some(w) = self.violence.as_mut() {
            w.stop();
        }
        if let Some(w) = self.weapons.as_mut() {
            w.stop();
        }
        self.recorder.shutdown();
        info!(ticks = self.ticks, clips = self.recorder.clips_finalized(), "Pipeline shut down");
    }

    /// Handle for pressing the doorbell from another thread
    pub fn doorbell(&self) -> DoorbellHandle {
        self.doorbell.clone()
    }

    pub fn deriver(&self) -> &SignalDeriver {
        &self.deriver
    }

    pub fn recorder(&self) -> &ClipRecorder {
        &self.recorder
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Health of each configured worker
    pub fn worker_health(&self) -> Vec<(String, WorkerHealth)> {
        let mut out = Vec::new();
        if let Some(w) = &self.violence {
            out.push((w.name().to_string(), w.health()));
        }
        if let Some(w) = &self.weapons {
            out.push((w.name().to_string(), w.health()));
        }
        out
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.recorder.shutdown();
    }
}

/// Submit `frame` and collect whatever result is ready. With `lockstep`, a
/// queued frame is waited on for up to that long.
fn exchange<D: Detector>(worker: &DetectorWorker<D>, frame: &Frame, lockstep: Option<Duration>) -> Option<D::Output> {
    let queued = worker.submit(frame.clone());
    match lockstep {
        Some(timeout) if queued => worker.poll_wait(timeout),
        _ => worker.poll(),
    }
}

fn default_writer(config: &Config) -> ClipWriter {
    let writer = ClipWriter::new(&config.capture);
    match enrichment::from_config(&config.enrichment) {
        Some(enricher) => writer.with_enricher(enricher),
        None => writer,
    }
}

/// Assembles a [`Sentinel`] with optional collaborators
pub struct SentinelBuilder {
    config: Config,
    sink: Option<Arc<dyn ClipSink>>,
    pose: Option<Box<dyn PoseEstimator>>,
    violence: Option<DetectorFactory<DynDetector<ViolenceProbs>>>,
    weapons: Option<DetectorFactory<DynDetector<Vec<WeaponDetection>>>>,
    lockstep: Option<Duration>,
}

impl SentinelBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            sink: None,
            pose: None,
            violence: None,
            weapons: None,
            lockstep: None,
        }
    }

    /// Wait up to `timeout` each tick for the workers to answer the frame
    /// just submitted. For replaying recorded sessions; a live camera loop
    /// should never block on inference.
    pub fn lockstep(mut self, timeout: Duration) -> Self {
        self.lockstep = Some(timeout);
        self
    }

    pub fn pose(mut self, pose: Box<dyn PoseEstimator>) -> Self {
        self.pose = Some(pose);
        self
    }

    pub fn violence(mut self, factory: DetectorFactory<DynDetector<ViolenceProbs>>) -> Self {
        self.violence = Some(factory);
        self
    }

    pub fn weapons(mut self, factory: DetectorFactory<DynDetector<Vec<WeaponDetection>>>) -> Self {
        self.weapons = Some(factory);
        self
    }

    /// Replace the default clip writer
    pub fn sink(mut self, sink: Arc<dyn ClipSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Start the workers and build the pipeline
    pub fn build(self) -> crate::Result<Sentinel> {
        let config = &self.config;

        let violence = match self.violence {
            Some(factory) => {
                let mut w = DetectorWorker::new("violence", factory, &config.workers);
                w.start()?;
                Some(w)
            }
            None => None,
        };
        let weapons = match self.weapons {
            Some(factory) => {
                let mut w = DetectorWorker::new("weapon", factory, &config.workers);
                w.start()?;
                Some(w)
            }
            None => None,
        };

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(default_writer(config)) as Arc<dyn ClipSink>);

        info!(
            pose = self.pose.is_some(),
            violence = violence.is_some(),
            weapons = weapons.is_some(),
            fps = config.pipeline.fps,
            lockstep = self.lockstep.is_some(),
            "Pipeline assembled"
        );
        let mut sentinel = Sentinel::assemble(config, sink, self.pose, violence, weapons);
        sentinel.lockstep = self.lockstep;
        Ok(sentinel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ClipMetadata;
    use crate::signals::{KeypointSet, KEYPOINT_COUNT};
    use crate::time::ManualClock;
    use crate::workers::{boxed_factory, Detector};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MemorySink {
        clips: Mutex<Vec<ClipMetadata>>,
    }

    impl ClipSink for MemorySink {
        fn persist(&self, _frames: Vec<Frame>, metadata: ClipMetadata) {
            self.clips.lock().push(metadata);
        }
    }

    struct StandingPose;

    impl PoseEstimator for StandingPose {
        fn estimate(&mut self, _frame: &Frame) -> crate::Result<Option<KeypointSet>> {
            KeypointSet::from_pairs(&[[0.5, 0.5]; KEYPOINT_COUNT]).map(Some)
        }
    }

    struct BrokenPose;

    impl PoseEstimator for BrokenPose {
        fn estimate(&mut self, _frame: &Frame) -> crate::Result<Option<KeypointSet>> {
            Err(crate::Error::Detector("camera unplugged".to_string()))
        }
    }

    struct Knife;

    impl Detector for Knife {
        type Output = Vec<WeaponDetection>;

        fn infer(&mut self, _frame: &Frame) -> crate::Result<Self::Output> {
            Ok(vec![WeaponDetection {
                bbox: Default::default(),
                score: 0.95,
                class: "knife".to_string(),
            }])
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.pipeline.fps = 10.0;
        config.workers.input_timeout_ms = 5;
        config
    }

    #[test]
    fn test_empty_ticks_stay_calm() {
        let sink = Arc::new(MemorySink::default());
        let mut s = Sentinel::builder(&test_config()).sink(sink.clone()).build().unwrap();
        for i in 0..50 {
            let r = s.tick(Frame::blank(i, 4, 4), i as f64 * 0.1);
            assert_eq!(r.level, ThreatLevel::Calm);
            assert_eq!(r.clip_state, ClipState::Idle);
            assert!(r.score >= 0.0 && r.score <= 1.0);
        }
        assert_eq!(s.ticks(), 50);
        s.shutdown();
        assert!(sink.clips.lock().is_empty());
    }

    #[test]
    fn test_pose_error_is_absent_input() {
        let mut s = Sentinel::builder(&test_config())
            .sink(Arc::new(MemorySink::default()))
            .pose(Box::new(BrokenPose))
            .build()
            .unwrap();
        let r = s.tick(Frame::blank(0, 4, 4), 0.0);
        assert_eq!(r.bundle.presence_s, 0.0);
        assert_eq!(s.deriver().window_len(), 1);
    }

    #[test]
    fn test_subject_accumulates_presence() {
        let mut s = Sentinel::builder(&test_config())
            .sink(Arc::new(MemorySink::default()))
            .pose(Box::new(StandingPose))
            .build()
            .unwrap();
        let mut last = s.tick(Frame::blank(0, 4, 4), 100.0);
        for i in 1..=20 {
            last = s.tick(Frame::blank(i, 4, 4), 100.0 + i as f64 * 0.1);
        }
        assert!((last.bundle.presence_s - 2.0).abs() < 1e-9);
        assert_eq!(last.bundle.velocity, 0.0);
    }

    #[test]
    fn test_doorbell_presses_drained_each_tick() {
        let mut s = Sentinel::builder(&test_config())
            .sink(Arc::new(MemorySink::default()))
            .build()
            .unwrap();
        let bell = s.doorbell();
        bell.press();
        assert_eq!(bell.pending(), 1);

        let r = s.tick(Frame::blank(0, 4, 4), 0.0);
        assert_eq!(bell.pending(), 0);
        assert!(r.bundle.doorbell_rings > 0.0);
    }

    #[test]
    fn test_weapon_worker_triggers_recording() {
        let sink = Arc::new(MemorySink::default());
        let mut s = Sentinel::builder(&test_config())
            .sink(sink.clone())
            .weapons(boxed_factory(|| Ok(Knife)))
            .build()
            .unwrap();

        let mut recorded = false;
        for i in 0..500 {
            let r = s.tick(Frame::blank(i, 4, 4), i as f64 * 0.1);
            if r.clip_state == ClipState::Recording {
                assert!(r.bundle.weapon_confirmed);
                recorded = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(recorded);
        assert_eq!(s.worker_health(), vec![("weapon".to_string(), WorkerHealth::Ready)]);
        s.shutdown();
    }

    #[test]
    fn test_run_stops_on_flag() {
        struct Endless(u64);
        impl FrameSource for Endless {
            fn next_frame(&mut self) -> Option<Frame> {
                self.0 += 1;
                Some(Frame::blank(self.0, 2, 2))
            }
        }

        let mut s = Sentinel::builder(&test_config())
            .sink(Arc::new(MemorySink::default()))
            .build()
            .unwrap();
        let stop = AtomicBool::new(true);
        let summary = s.run(&mut Endless(0), &ManualClock::new(0.0), &stop, false);
        assert!(summary.interrupted);
        assert_eq!(summary.ticks, 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut s = Sentinel::builder(&test_config())
            .sink(Arc::new(MemorySink::default()))
            .pose(Box::new(StandingPose))
            .build()
            .unwrap();
        for i in 0..10 {
            s.tick(Frame::blank(i, 4, 4), i as f64 * 0.1);
        }
        s.reset().unwrap();
        assert_eq!(s.deriver().window_len(), 0);
        assert_eq!(s.recorder().state(), ClipState::Idle);
    }
}
