//! Integration tests for the capture lifecycle
//!
//! Recorder -> detached writer -> clip store, with real files in a temp dir.

use intent_sentinel::app::config::{CaptureConfig, Config};
use intent_sentinel::capture::{
    ClipRecorder, ClipState, ClipStore, ClipWriter, EncoderChain, Frame, Y4mEncoder,
};
use intent_sentinel::fusion::ThreatLevel;
use intent_sentinel::pipeline::Sentinel;
use intent_sentinel::signals::SignalBundle;
use intent_sentinel::workers::{boxed_factory, Detector, WeaponDetection};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn capture_config(dir: &TempDir) -> CaptureConfig {
    CaptureConfig {
        log_dir: dir.path().to_path_buf(),
        clip_duration_s: 2.0,
        cooldown_s: 1.0,
        ..Default::default()
    }
}

fn y4m_writer(config: &CaptureConfig) -> Arc<ClipWriter> {
    Arc::new(ClipWriter::new(config).with_encoders(EncoderChain::new(vec![Box::new(Y4mEncoder)])))
}

#[test]
fn test_recording_persists_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = capture_config(&dir);
    let mut recorder = ClipRecorder::new(&config, y4m_writer(&config));
    let bundle = SignalBundle {
        velocity: 0.8,
        ..Default::default()
    };

    for i in 0..10u64 {
        let now = 1_700_000_000.0 + i as f64 * 0.5;
        let (score, level) = if i < 2 { (0.75, ThreatLevel::Threat) } else { (0.3, ThreatLevel::Calm) };
        recorder.update_state(level, score, &bundle, false, now);
        recorder.update_frame(Frame::filled(i, 8, 6, [i as u8 * 20, 0, 0]), now);
    }
    assert_eq!(recorder.state(), ClipState::Idle);
    recorder.shutdown();

    let store = ClipStore::new(dir.path());
    let records = store.list().unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    let meta = &record.metadata;
    assert_eq!(meta.frame_count, 6);
    assert_eq!(meta.trigger_level, ThreatLevel::Threat);
    assert_eq!(meta.final_level, ThreatLevel::Calm);
    assert_eq!(meta.transitions.len(), 1);
    assert!(!meta.weapon_detected);
    assert_eq!(meta.signals_stats["velocity"].max, 0.8);
    assert!(!meta.signals_stats.contains_key("weapon_cooldown"));

    let video = record.artifacts.video.as_ref().unwrap();
    assert!(video.ends_with(".y4m"));
    assert!(store.clips_dir().join(video).exists());
    let thumb = record.artifacts.thumbnail.as_ref().unwrap();
    assert!(store.clips_dir().join(thumb).exists());
    assert_eq!(record.artifacts.summary, None);
}

#[test]
fn test_disabled_capture_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = CaptureConfig {
        disabled: true,
        ..capture_config(&dir)
    };
    let mut recorder = ClipRecorder::new(&config, y4m_writer(&config));
    for i in 0..10u64 {
        recorder.update_state(ThreatLevel::Threat, 1.0, &SignalBundle::default(), true, i as f64);
        recorder.update_frame(Frame::blank(i, 4, 4), i as f64);
    }
    recorder.shutdown();

    assert!(ClipStore::new(dir.path()).list().unwrap().is_empty());
}

#[test]
fn test_consecutive_clips_separated_by_cooldown() {
    let dir = TempDir::new().unwrap();
    let config = capture_config(&dir);
    let mut recorder = ClipRecorder::new(&config, y4m_writer(&config));

    let mut states = Vec::new();
    for i in 0..20u64 {
        let now = 1_000.0 + i as f64 * 0.5;
        recorder.update_state(ThreatLevel::Threat, 0.9, &SignalBundle::default(), false, now);
        recorder.update_frame(Frame::blank(i, 4, 4), now);
        states.push(recorder.state());
    }
    recorder.shutdown();

    // finalized on the 6th tick, idle once the cooldown expires, re-triggered on the next tick
    assert_eq!(&states[..9], &[
        ClipState::Recording,
        ClipState::Recording,
        ClipState::Recording,
        ClipState::Recording,
        ClipState::Recording,
        ClipState::Cooldown,
        ClipState::Cooldown,
        ClipState::Idle,
        ClipState::Recording,
    ]);
    assert_eq!(recorder.clips_finalized(), 2);
    assert_eq!(ClipStore::new(dir.path()).list().unwrap().len(), 2);
}

struct Knife;

impl Detector for Knife {
    type Output = Vec<WeaponDetection>;

    fn infer(&mut self, _frame: &Frame) -> intent_sentinel::Result<Self::Output> {
        Ok(vec![WeaponDetection {
            bbox: Default::default(),
            score: 0.97,
            class: "knife".to_string(),
        }])
    }
}

#[test]
fn test_weapon_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.pipeline.fps = 10.0;
    config.capture = CaptureConfig {
        clip_duration_s: 1.0,
        ..capture_config(&dir)
    };
    config.workers.input_timeout_ms = 5;

    let sink = y4m_writer(&config.capture);
    let mut sentinel = Sentinel::builder(&config)
        .sink(sink)
        .weapons(boxed_factory(|| Ok(Knife)))
        .build()
        .unwrap();

    let mut i = 0u64;
    while sentinel.recorder().clips_finalized() == 0 && i < 2_000 {
        sentinel.tick(Frame::blank(i, 4, 4), 50.0 + i as f64 * 0.1);
        std::thread::sleep(Duration::from_millis(1));
        i += 1;
    }
    sentinel.shutdown();

    let records = ClipStore::new(dir.path()).list().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].metadata.weapon_detected);
    assert!(records[0].metadata.stat_max("weapon_score") > 0.9);
}
