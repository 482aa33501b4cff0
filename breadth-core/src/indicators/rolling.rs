//! Fixed-capacity FIFO window with a running sum.
//!
//! Used for the moving-average windows and the prior-volume window. The sum
//! is maintained incrementally with Neumaier compensation: add the entering
//! value, then subtract the evicted one. A window of identical values then
//! averages back to that value to within a few ULPs, however long it has run.

use std::collections::VecDeque;

/// Relative slack, in machine epsilons, for comparisons against the mean.
const MEAN_ULPS: f64 = 4.0;

#[derive(Debug, Clone)]
pub struct RollingSum {
    values: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    compensation: f64,
}

impl RollingSum {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "RollingSum capacity must be >= 1");
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
            compensation: 0.0,
        }
    }

    /// Append a value, evicting the oldest when at capacity.
    ///
    /// Returns the evicted value, if any.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.is_full() {
            self.values.pop_front()
        } else {
            None
        };
        self.values.push_back(value);
        self.accumulate(value);
        if let Some(old) = evicted {
            self.accumulate(-old);
        }
        evicted
    }

    fn accumulate(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Mean of the window, defined only once it holds `capacity` values.
    pub fn full_mean(&self) -> Option<f64> {
        if self.is_full() {
            Some((self.sum + self.compensation) / self.capacity as f64)
        } else {
            None
        }
    }

    /// Whether `value` lies strictly above the full window's mean.
    ///
    /// Differences within a few ULPs of `value` count as equal, so a window
    /// of identical values never has its own value above the mean.
    pub fn exceeds_mean(&self, value: f64) -> Option<bool> {
        self.full_mean()
            .map(|mean| value - mean > MEAN_ULPS * f64::EPSILON * value.abs())
    }
}
