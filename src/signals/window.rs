//! Fixed-capacity sliding window
//!
//! Every raw feature keeps its last `capacity` samples. A push on a full
//! window evicts exactly the oldest entry.

use std::collections::VecDeque;

/// Fixed-capacity ring buffer of samples
#[derive(Debug, Clone)]
pub struct Window<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> Window<T> {
    /// Create an empty window. A zero capacity is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, returning the evicted oldest sample if the window was full
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.buf.len() == self.capacity {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest sample
    pub fn first(&self) -> Option<&T> {
        self.buf.front()
    }

    /// Newest sample
    pub fn last(&self) -> Option<&T> {
        self.buf.back()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.buf.iter()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl<T: Clone> Window<T> {
    /// Copy out the contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.iter().cloned().collect()
    }
}

impl Window<f64> {
    /// Sum of all samples (0 when empty)
    pub fn sum(&self) -> f64 {
        self.buf.iter().sum()
    }

    /// Arithmetic mean (0 when empty)
    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            0.0
        } else {
            self.sum() / self.buf.len() as f64
        }
    }

    /// Mean absolute first difference (0 with fewer than two samples)
    pub fn mean_abs_diff(&self) -> f64 {
        mean_abs_diff(self.buf.iter().copied())
    }
}

/// Mean of |x[i+1] - x[i]| over a sequence; 0 with fewer than two samples
pub fn mean_abs_diff<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut iter = values.into_iter();
    let Some(mut prev) = iter.next() else {
        return 0.0;
    };

    let mut total = 0.0;
    let mut n = 0usize;
    for v in iter {
        total += (v - prev).abs();
        prev = v;
        n += 1;
    }

    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}
