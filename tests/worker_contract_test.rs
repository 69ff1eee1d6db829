//! Integration tests for the detector worker contract
//!
//! Capacity-1 input under both submit policies, latest-wins output, and
//! permanent failure.

use intent_sentinel::app::config::WorkerConfig;
use intent_sentinel::capture::Frame;
use intent_sentinel::workers::{Detector, DetectorWorker, SubmitPolicy, WorkerHealth};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blocks inside the first inference until the gate opens
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
    seen: Mutex<Vec<u64>>,
}

impl Gate {
    fn release(&self) {
        *self.open.lock() = true;
        self.cv.notify_all();
    }

    fn seen(&self) -> Vec<u64> {
        self.seen.lock().clone()
    }
}

struct GatedDetector {
    gate: Arc<Gate>,
}

impl Detector for GatedDetector {
    type Output = u64;

    fn infer(&mut self, frame: &Frame) -> intent_sentinel::Result<u64> {
        self.gate.seen.lock().push(frame.seq());
        let mut open = self.gate.open.lock();
        while !*open {
            self.gate.cv.wait(&mut open);
        }
        Ok(frame.seq())
    }
}

fn worker(policy: SubmitPolicy, gate: &Arc<Gate>) -> DetectorWorker<GatedDetector> {
    let gate = Arc::clone(gate);
    let config = WorkerConfig {
        input_timeout_ms: 5,
        submit_policy: policy,
    };
    DetectorWorker::new("gated", Arc::new(move || Ok::<_, intent_sentinel::Error>(GatedDetector { gate: Arc::clone(&gate) })), &config)
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Submit frame 0, wait until the worker is blocked on it, then submit 1 and 2
fn submit_two_while_busy(w: &mut DetectorWorker<GatedDetector>, gate: &Arc<Gate>) -> (bool, bool) {
    w.start().unwrap();
    assert!(w.submit(Frame::blank(0, 1, 1)));
    assert!(wait_until(|| gate.seen() == vec![0]));
    let first = w.submit(Frame::blank(1, 1, 1));
    let second = w.submit(Frame::blank(2, 1, 1));
    gate.release();
    (first, second)
}

#[test]
fn test_drop_newest_keeps_first_pending_frame() {
    let gate = Arc::new(Gate::default());
    let mut w = worker(SubmitPolicy::DropNewest, &gate);

    let (first, second) = submit_two_while_busy(&mut w, &gate);
    assert!(first);
    assert!(!second, "occupied slot rejects the newer frame");

    assert!(wait_until(|| w.stats().overwritten == 1));
    assert_eq!(gate.seen(), vec![0, 1]);
    // latest wins: frame 0's result was overwritten by frame 1's
    assert_eq!(w.poll(), Some(1));
    assert_eq!(w.poll(), None);

    let stats = w.stats();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.dropped, 1);
    w.stop();
    assert_eq!(w.health(), WorkerHealth::Stopped);
}

#[test]
fn test_replace_stale_infers_only_newest() {
    let gate = Arc::new(Gate::default());
    let mut w = worker(SubmitPolicy::ReplaceStale, &gate);

    let (first, second) = submit_two_while_busy(&mut w, &gate);
    assert!(first && second);

    assert!(wait_until(|| w.stats().overwritten == 1));
    assert_eq!(gate.seen(), vec![0, 2]);
    assert_eq!(w.poll(), Some(2));
    assert_eq!(w.stats().dropped, 1);
    w.stop();
}

#[test]
fn test_submit_before_start_is_dropped() {
    let gate = Arc::new(Gate::default());
    let w = worker(SubmitPolicy::DropNewest, &gate);
    assert!(!w.submit(Frame::blank(0, 1, 1)));
    assert_eq!(w.poll(), None);
    assert_eq!(w.health(), WorkerHealth::Idle);
}

struct Unloadable;

impl Detector for Unloadable {
    type Output = u64;

    fn infer(&mut self, _frame: &Frame) -> intent_sentinel::Result<u64> {
        Ok(0)
    }
}

#[test]
fn test_load_failure_is_permanent() {
    let mut w: DetectorWorker<Unloadable> = DetectorWorker::new(
        "broken",
        Arc::new(|| Err::<Unloadable, _>(intent_sentinel::Error::Detector("model file missing".to_string()))),
        &WorkerConfig::default(),
    );
    w.start().unwrap();
    assert!(wait_until(|| w.health() == WorkerHealth::Failed));

    assert!(!w.submit(Frame::blank(0, 1, 1)));
    assert_eq!(w.poll(), None);
    assert!(w.reset().is_err());
    assert!(w.start().is_err());
    assert_eq!(w.health(), WorkerHealth::Failed);
}

#[test]
fn test_reset_restarts_from_factory() {
    let gate = Arc::new(Gate::default());
    gate.release();
    let mut w = worker(SubmitPolicy::DropNewest, &gate);
    w.start().unwrap();
    assert!(w.submit(Frame::blank(7, 1, 1)));
    assert!(wait_until(|| w.stats().inferred == 1));

    w.reset().unwrap();
    assert!(w.is_running());
    assert_eq!(w.poll(), None, "reset clears the output slot");
    assert!(wait_until(|| w.health() == WorkerHealth::Ready));
    w.stop();
}
