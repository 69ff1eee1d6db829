//! Detector Worker
//!
//! Runs one [`Detector`] on a dedicated thread behind two capacity-1 slots:
//!
//! ```text
//!   submit(frame) ──▶ [input slot] ──▶ thread: infer ──▶ [result slot] ──▶ poll()
//! ```
//!
//! Neither side ever blocks the tick loop. The model is built inside the
//! thread from a factory; a load or inference failure parks the worker in
//! [`WorkerHealth::Failed`] for the rest of the process.

use super::detector::{Detector, DetectorFactory};
use super::mailbox::Mailbox;
use crate::app::config::WorkerConfig;
use crate::capture::Frame;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What `submit` does when the input slot is already occupied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Keep the queued frame, drop the new one
    #[default]
    DropNewest,
    /// Evict the queued frame in favour of the new one
    ReplaceStale,
}

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerHealth {
    /// Not started yet
    Idle = 0,
    /// Thread running, model loading
    Loading = 1,
    /// Model loaded, serving frames
    Ready = 2,
    /// Stopped cleanly
    Stopped = 3,
    /// Load or inference failed; permanent
    Failed = 4,
}

impl WorkerHealth {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Loading,
            2 => Self::Ready,
            3 => Self::Stopped,
            4 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

/// Worker counters (lock-free)
#[derive(Debug, Default)]
struct WorkerCounters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    inferred: AtomicU64,
    overwritten: AtomicU64,
}

/// Snapshot of worker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WorkerStats {
    /// Frames passed to `submit`
    pub submitted: u64,
    /// Frames that never reached inference
    pub dropped: u64,
    /// Successful inferences
    pub inferred: u64,
    /// Results replaced before anyone polled them
    pub overwritten: u64,
}

/// State shared between the handle and its thread
struct Shared<O> {
    input: Mailbox<Frame>,
    output: Mailbox<O>,
    stop: AtomicBool,
    health: AtomicU8,
    counters: WorkerCounters,
}

impl<O> Shared<O> {
    fn health(&self) -> WorkerHealth {
        WorkerHealth::from_u8(self.health.load(Ordering::Acquire))
    }

    fn set_health(&self, health: WorkerHealth) {
        self.health.store(health as u8, Ordering::Release);
    }
}

/// Handle to a detector running on its own thread
pub struct DetectorWorker<D: Detector> {
    name: String,
    factory: DetectorFactory<D>,
    policy: SubmitPolicy,
    input_timeout: Duration,
    shared: Arc<Shared<D::Output>>,
    handle: Option<JoinHandle<()>>,
}

impl<D: Detector> DetectorWorker<D> {
    /// Create a worker. Nothing runs until [`start`](Self::start).
    pub fn new(name: impl Into<String>, factory: DetectorFactory<D>, config: &WorkerConfig) -> Self {
        Self {
            name: name.into(),
            factory,
            policy: config.submit_policy,
            input_timeout: Duration::from_millis(config.input_timeout_ms.max(1)),
            shared: Arc::new(Shared {
                input: Mailbox::new(),
                output: Mailbox::new(),
                stop: AtomicBool::new(false),
                health: AtomicU8::new(WorkerHealth::Idle as u8),
                counters: WorkerCounters::default(),
            }),
            handle: None,
        }
    }

    /// Spawn the worker thread. A no-op while already running.
    pub fn start(&mut self) -> crate::Result<()> {
        if self.health() == WorkerHealth::Failed {
            return Err(crate::Error::Worker(format!("{} has failed permanently", self.name)));
        }
        if self.handle.is_some() {
            return Ok(());
        }

        self.shared.stop.store(false, Ordering::Release);
        self.shared.set_health(WorkerHealth::Loading);

        let shared = Arc::clone(&self.shared);
        let factory = Arc::clone(&self.factory);
        let timeout = self.input_timeout;
        let name = self.name.clone();

        let handle = std::thread::Builder::new()
            .name(format!("{}-worker", self.name))
            .spawn(move || run_worker(&name, factory, shared, timeout))
            .map_err(|e| {
                self.shared.set_health(WorkerHealth::Failed);
                crate::Error::Worker(format!("failed to spawn {}: {}", self.name, e))
            })?;

        self.handle = Some(handle);
        info!(worker = %self.name, policy = ?self.policy, "Worker started");
        Ok(())
    }

    /// Offer a frame without blocking. Returns whether it was queued.
    pub fn submit(&self, frame: Frame) -> bool {
        let counters = &self.shared.counters;
        counters.submitted.fetch_add(1, Ordering::Relaxed);

        if self.handle.is_none() || self.health() == WorkerHealth::Failed {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        match self.policy {
            SubmitPolicy::DropNewest => match self.shared.input.try_put(frame) {
                Ok(()) => true,
                Err(_) => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    false
                }
            },
            SubmitPolicy::ReplaceStale => {
                if self.shared.input.replace(frame).is_some() {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
        }
    }

    /// Take the latest result, if a new one arrived since the last poll
    pub fn poll(&self) -> Option<D::Output> {
        if self.health() == WorkerHealth::Failed {
            return None;
        }
        self.shared.output.take()
    }

    /// Block until a result arrives, the worker fails, or `timeout` passes.
    /// Used by lockstep replay; the live tick loop only calls [`poll`](Self::poll).
    pub fn poll_wait(&self, timeout: Duration) -> Option<D::Output> {
        let deadline = Instant::now() + timeout;
        while self.handle.is_some() {
            if self.health() == WorkerHealth::Failed {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            if let Some(result) = self.shared.output.take_timeout(remaining.min(self.input_timeout)) {
                return Some(result);
            }
        }
        None
    }

    /// Ask the thread to stop and wait for it. The request is observed at
    /// the next input wait, after any in-progress inference.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(worker = %self.name, "Worker thread panicked");
                self.shared.set_health(WorkerHealth::Failed);
            }
            debug!(worker = %self.name, "Worker joined");
        }
    }

    /// Full restart: stop, join, clear both slots, reload from the factory.
    /// A failed worker stays failed.
    pub fn reset(&mut self) -> crate::Result<()> {
        if self.health() == WorkerHealth::Failed {
            warn!(worker = %self.name, "Reset ignored for failed worker");
            return Err(crate::Error::Worker(format!("{} has failed permanently", self.name)));
        }
        self.stop();
        self.shared.input.clear();
        self.shared.output.clear();
        self.start()
    }

    pub fn health(&self) -> WorkerHealth {
        self.shared.health()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> WorkerStats {
        let c = &self.shared.counters;
        WorkerStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            inferred: c.inferred.load(Ordering::Relaxed),
            overwritten: c.overwritten.load(Ordering::Relaxed),
        }
    }
}

impl<D: Detector> Drop for DetectorWorker<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<D: Detector>(
    name: &str,
    factory: DetectorFactory<D>,
    shared: Arc<Shared<D::Output>>,
    timeout: Duration,
) {
    let mut detector = match factory() {
        Ok(d) => d,
        Err(e) => {
            error!(worker = %name, error = %e, "Model load failed");
            shared.set_health(WorkerHealth::Failed);
            return;
        }
    };
    shared.set_health(WorkerHealth::Ready);
    debug!(worker = %name, "Model loaded");

    while !shared.stop.load(Ordering::Acquire) {
        let Some(frame) = shared.input.take_timeout(timeout) else {
            continue;
        };

        match detector.infer(&frame) {
            Ok(result) => {
                shared.counters.inferred.fetch_add(1, Ordering::Relaxed);
                if shared.output.replace(result).is_some() {
                    shared.counters.overwritten.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                error!(worker = %name, seq = frame.seq(), error = %e, "Inference failed");
                shared.set_health(WorkerHealth::Failed);
                return;
            }
        }
    }

    shared.set_health(WorkerHealth::Stopped);
}
