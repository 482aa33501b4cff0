//! Exponential moving average as a resumable recurrence.
//!
//! EMA[t] = EMA[t-1] + alpha * (x[t] - EMA[t-1]), alpha = 2 / (period + 1).
//! Seed: the first value smoothed is taken as-is.
//!
//! The running value is the whole state, so an EMA restored from a persisted
//! value continues exactly where a from-scratch computation would be.

/// Smoothing factor for an EMA of the given period.
pub fn ema_alpha(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            alpha: ema_alpha(period),
            value: None,
        }
    }

    /// Continue from a previously persisted value, or seed afresh without one.
    pub fn resume(period: usize, value: Option<f64>) -> Self {
        Self {
            value,
            ..Self::new(period)
        }
    }

    /// Feed the next observation and return the updated average.
    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(prev) => prev + self.alpha * (x - prev),
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
