//! Exponential moving average

/// Exponential smoother with a fixed factor.
///
/// `update(x)` returns `alpha * x + (1 - alpha) * s`. The first sample after
/// construction or [`reset`](Ema::reset) initializes the state directly.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    state: Option<f64>,
}

impl Ema {
    /// Create a smoother; `alpha` is clamped into (0, 1]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() { alpha.clamp(f64::EPSILON, 1.0) } else { 1.0 };
        Self { alpha, state: None }
    }

    /// Feed one sample and return the smoothed value
    #[inline]
    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.state {
            Some(s) => self.alpha * x + (1.0 - self.alpha) * s,
            None => x,
        };
        self.state = Some(next);
        next
    }

    /// Current smoothed value, if any sample has been seen
    pub fn value(&self) -> Option<f64> {
        self.state
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}
