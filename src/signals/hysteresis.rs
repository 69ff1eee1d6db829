//! Hysteresis counters over a window of samples
//!
//! Both counters are recomputed from the window contents each tick, so they
//! carry no memory beyond the window itself.

/// Sign state of a hysteresis counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Neutral,
    Positive,
    Negative,
}

/// Counts sign flips that clear a dead band.
///
/// A sample only moves the state when its magnitude exceeds `dead_band`.
/// The first such sample sets the initial polarity without counting; every
/// later sample that lands beyond the band on the opposite side counts one
/// crossing. Used for head oscillation (over smoothed yaw) and for direction
/// reversal (over horizontal centroid deltas), each with its own band.
#[derive(Debug, Clone, Copy)]
pub struct SignCrossingCounter {
    dead_band: f64,
}

impl SignCrossingCounter {
    pub fn new(dead_band: f64) -> Self {
        Self {
            dead_band: dead_band.abs(),
        }
    }

    pub fn count<I: IntoIterator<Item = f64>>(&self, values: I) -> u32 {
        let mut state = Polarity::Neutral;
        let mut crossings = 0;

        for v in values {
            let next = if v > self.dead_band {
                Polarity::Positive
            } else if v < -self.dead_band {
                Polarity::Negative
            } else {
                continue;
            };

            if state != Polarity::Neutral && next != state {
                crossings += 1;
            }
            state = next;
        }

        crossings
    }
}

/// Counts "go" transitions of a stop/go hysteresis.
///
/// The subject enters "stopped" below `stop_threshold` and resumes only
/// above `stop_threshold * resume_ratio`. The initial state is taken from the
/// first sample; only resumes are counted.
#[derive(Debug, Clone, Copy)]
pub struct StopGoCounter {
    stop_threshold: f64,
    resume_threshold: f64,
}

impl StopGoCounter {
    pub fn new(stop_threshold: f64, resume_ratio: f64) -> Self {
        Self {
            stop_threshold,
            resume_threshold: stop_threshold * resume_ratio,
        }
    }

    pub fn count<I: IntoIterator<Item = f64>>(&self, speeds: I) -> u32 {
        let mut iter = speeds.into_iter();
        let Some(first) = iter.next() else {
            return 0;
        };

        let mut stopped = first < self.stop_threshold;
        let mut resumes = 0;

        for v in iter {
            if stopped {
                if v > self.resume_threshold {
                    stopped = false;
                    resumes += 1;
                }
            } else if v < self.stop_threshold {
                stopped = true;
            }
        }

        resumes
    }
}
