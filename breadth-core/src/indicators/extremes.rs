//! Trailing max/min over the last N values using monotonic deques.
//!
//! Each value enters each deque once and leaves once, so `push` is O(1)
//! amortized regardless of the window length (251 closes for the 52-week
//! window).

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingExtremes {
    capacity: usize,
    /// Number of values pushed so far; also the index of the next value.
    seen: u64,
    /// (index, value), values non-increasing front to back.
    max_q: VecDeque<(u64, f64)>,
    /// (index, value), values non-decreasing front to back.
    min_q: VecDeque<(u64, f64)>,
}

impl RollingExtremes {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "RollingExtremes capacity must be >= 1");
        Self {
            capacity,
            seen: 0,
            max_q: VecDeque::new(),
            min_q: VecDeque::new(),
        }
    }

    pub fn push(&mut self, value: f64) {
        let idx = self.seen;
        self.seen += 1;

        while matches!(self.max_q.back(), Some(&(_, v)) if v <= value) {
            self.max_q.pop_back();
        }
        self.max_q.push_back((idx, value));

        while matches!(self.min_q.back(), Some(&(_, v)) if v >= value) {
            self.min_q.pop_back();
        }
        self.min_q.push_back((idx, value));

        // Oldest index still inside the window.
        let oldest = self.seen.saturating_sub(self.capacity as u64);
        while matches!(self.max_q.front(), Some(&(i, _)) if i < oldest) {
            self.max_q.pop_front();
        }
        while matches!(self.min_q.front(), Some(&(i, _)) if i < oldest) {
            self.min_q.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.seen.min(self.capacity as u64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.seen == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn max(&self) -> Option<f64> {
        self.max_q.front().map(|&(_, v)| v)
    }

    pub fn min(&self) -> Option<f64> {
        self.min_q.front().map(|&(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute(values: &[f64], end: usize, cap: usize) -> (f64, f64) {
        let start = end.saturating_sub(cap);
        let w = &values[start..end];
        (
            w.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            w.iter().cloned().fold(f64::INFINITY, f64::min),
        )
    }

    #[test]
    fn empty_has_no_extremes() {
        let w = RollingExtremes::new(3);
        assert!(w.is_empty());
        assert_eq!(w.max(), None);
        assert_eq!(w.min(), None);
    }

    #[test]
    fn matches_brute_force_scan() {
        let values = [5.0, 3.0, 8.0, 8.0, 1.0, 4.0, 9.0, 2.0, 2.0, 7.0, 6.0];
        let cap = 4;
        let mut w = RollingExtremes::new(cap);
        for (i, &v) in values.iter().enumerate() {
            w.push(v);
            let (mx, mn) = brute(&values, i + 1, cap);
            assert_eq!(w.max(), Some(mx), "max at {i}");
            assert_eq!(w.min(), Some(mn), "min at {i}");
        }
    }

    #[test]
    fn old_maximum_expires() {
        let mut w = RollingExtremes::new(2);
        w.push(10.0);
        w.push(1.0);
        assert_eq!(w.max(), Some(10.0));
        w.push(2.0);
        assert_eq!(w.max(), Some(2.0));
        assert_eq!(w.min(), Some(1.0));
        assert!(w.is_full());
    }
}
