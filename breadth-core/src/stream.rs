//! Per-security indicator stream.
//!
//! Consumes one security's bars in ascending date order and emits the day's
//! breadth flags for each bar. Only the security's own past is consulted:
//! a trailing window of prior closes for 52-week extremes, one FIFO per
//! moving-average window, and a FIFO of prior volumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::BreadthConfig;
use crate::domain::Bar;
use crate::indicators::{RollingExtremes, RollingSum};

/// Breadth flags of one security on one day.
///
/// `above_ma` is a bitmask: bit `i` is set when the close is above the
/// moving average of the `i`-th configured window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayFlags {
    pub advance: bool,
    pub decline: bool,
    pub new_high: bool,
    pub new_low: bool,
    pub above_ma: u32,
    pub spike_up: bool,
    pub spike_down: bool,
}

impl DayFlags {
    pub fn above_ma(&self, window_index: usize) -> bool {
        window_index < 32 && self.above_ma & (1 << window_index) != 0
    }
}

/// Flags tagged with their date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityDay {
    pub date: NaiveDate,
    pub flags: DayFlags,
}

/// Streaming indicator state for a single security.
#[derive(Debug, Clone)]
pub struct IndicatorStream {
    prev_close: Option<f64>,
    prior_closes: RollingExtremes,
    ma_windows: Vec<RollingSum>,
    prior_volumes: RollingSum,
    spike_pct: f64,
    spike_volume_mult: f64,
}

impl IndicatorStream {
    pub fn new(config: &BreadthConfig) -> Self {
        Self {
            prev_close: None,
            prior_closes: RollingExtremes::new(config.high_low_lookback),
            ma_windows: config.ma_windows.iter().map(|&w| RollingSum::new(w)).collect(),
            prior_volumes: RollingSum::new(config.volume_lookback),
            spike_pct: config.spike_pct,
            spike_volume_mult: config.spike_volume_mult,
        }
    }

    /// Advance the stream by one bar and return that day's flags.
    pub fn next_day(&mut self, bar: &Bar) -> DayFlags {
        let close = bar.close;
        let mut flags = DayFlags::default();

        // Advance / decline against the previous close; ties count as neither.
        let mut pct_change = None;
        if let Some(prev) = self.prev_close {
            flags.advance = close > prev;
            flags.decline = close < prev;
            if prev != 0.0 {
                pct_change = Some((close - prev) / prev);
            }
        }

        // 52-week extremes against the prior closes only, once the window is full.
        if self.prior_closes.is_full() {
            if let Some(max_prev) = self.prior_closes.max().filter(|m| *m != 0.0) {
                flags.new_high = close > max_prev;
            }
            if let Some(min_prev) = self.prior_closes.min().filter(|m| *m != 0.0) {
                flags.new_low = close < min_prev;
            }
        }
        self.prior_closes.push(close);

        // Moving averages include today's close.
        for (i, window) in self.ma_windows.iter_mut().enumerate() {
            window.push(close);
            if window.exceeds_mean(close) == Some(true) {
                flags.above_ma |= 1 << i;
            }
        }

        // Prior-volume average excludes today; today is appended afterwards.
        let avg_volume = self.prior_volumes.full_mean();
        self.prior_volumes.push(bar.volume);

        if let (Some(pct), Some(avg)) = (pct_change, avg_volume) {
            if bar.has_range() {
                let mid = (bar.high + bar.low) / 2.0;
                let in_top_half = close >= mid;
                let in_bottom_half = close <= mid;
                let heavy = bar.volume >= self.spike_volume_mult * avg;

                flags.spike_up = pct >= self.spike_pct && heavy && in_top_half;
                flags.spike_down = pct <= -self.spike_pct && heavy && in_bottom_half;
            }
        }

        self.prev_close = Some(close);
        flags
    }
}

/// Run a fresh stream over a security's bars.
pub fn security_days(config: &BreadthConfig, bars: &[Bar]) -> Vec<SecurityDay> {
    let mut stream = IndicatorStream::new(config);
    bars.iter()
        .map(|bar| SecurityDay {
            date: bar.date,
            flags: stream.next_day(bar),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn bar(day: i64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day),
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn advance_decline_and_ties() {
        let days = security_days(&BreadthConfig::default(), &make_bars(&[10.0, 11.0, 9.0, 9.0]));
        assert!(!days[0].flags.advance && !days[0].flags.decline);
        assert!(days[1].flags.advance);
        assert!(days[2].flags.decline);
        assert!(!days[3].flags.advance && !days[3].flags.decline);
    }

    #[test]
    fn no_bars_no_output() {
        assert!(security_days(&BreadthConfig::default(), &[]).is_empty());
    }

    #[test]
    fn new_high_needs_full_prior_window() {
        let config = BreadthConfig {
            high_low_lookback: 3,
            ..BreadthConfig::default()
        };
        let days = security_days(&config, &make_bars(&[10.0, 11.0, 12.0, 13.0, 12.5, 9.0]));
        // Days 0..=2 have fewer than 3 prior closes.
        assert!(days[..3].iter().all(|d| !d.flags.new_high && !d.flags.new_low));
        // Day 3: 13 > max(10, 11, 12)
        assert!(days[3].flags.new_high);
        // Day 4: 12.5 < 13
        assert!(!days[4].flags.new_high);
        // Day 5: 9 < min(12, 13, 12.5)
        assert!(days[5].flags.new_low);
    }

    #[test]
    fn equal_to_prior_max_is_not_a_new_high() {
        let config = BreadthConfig {
            high_low_lookback: 2,
            ..BreadthConfig::default()
        };
        let days = security_days(&config, &make_bars(&[10.0, 12.0, 12.0]));
        assert!(!days[2].flags.new_high);
    }

    #[test]
    fn zero_prior_extreme_suppresses_flag() {
        let config = BreadthConfig {
            high_low_lookback: 2,
            ..BreadthConfig::default()
        };
        let days = security_days(&config, &make_bars(&[0.0, 0.0, 1.0]));
        assert!(!days[2].flags.new_high);
    }

    #[test]
    fn identical_closes_are_not_above_ma() {
        let config = BreadthConfig::default();
        let days = security_days(&config, &make_bars(&[50.0; 5]));
        // Window 5 (bit 0) is full on day 5 but close == average.
        assert!(!days[4].flags.above_ma(0));
    }

    #[test]
    fn fractional_flat_closes_are_not_above_ma() {
        let config = BreadthConfig::default();
        let days = security_days(&config, &make_bars(&[248.22; 5]));
        assert!(!days[4].flags.above_ma(0));

        // Every window, on the day it fills and long after evictions start.
        let days = security_days(&config, &make_bars(&[472.69; 400]));
        assert!(days.iter().all(|d| d.flags.above_ma == 0));
    }

    #[test]
    fn ma_includes_todays_close() {
        let config = BreadthConfig {
            ma_windows: vec![2],
            ..BreadthConfig::default()
        };
        let days = security_days(&config, &make_bars(&[10.0, 12.0, 11.0]));
        assert!(!days[0].flags.above_ma(0));
        // mean(10, 12) = 11 < 12
        assert!(days[1].flags.above_ma(0));
        // mean(12, 11) = 11.5 > 11
        assert!(!days[2].flags.above_ma(0));
    }

    #[test]
    fn spike_up_and_range_position() {
        let config = BreadthConfig {
            volume_lookback: 2,
            ..BreadthConfig::default()
        };
        let mut bars = vec![
            bar(0, 101.0, 99.0, 100.0, 1000.0),
            bar(1, 101.0, 99.0, 100.0, 1000.0),
            // +2%, 1.3x volume, close at the top of the range
            bar(2, 102.0, 100.0, 102.0, 1300.0),
        ];
        let days = security_days(&config, &bars);
        assert!(days[2].flags.spike_up);
        assert!(!days[2].flags.spike_down);

        // Same move but closing in the lower half of a wide range.
        bars[2] = bar(2, 110.0, 100.0, 102.0, 1300.0);
        let days = security_days(&config, &bars);
        assert!(!days[2].flags.spike_up);
    }

    #[test]
    fn spike_down_requires_volume() {
        let config = BreadthConfig {
            volume_lookback: 2,
            ..BreadthConfig::default()
        };
        let mut bars = vec![
            bar(0, 101.0, 99.0, 100.0, 1000.0),
            bar(1, 101.0, 99.0, 100.0, 1000.0),
            bar(2, 100.0, 97.0, 97.0, 1250.0),
        ];
        assert!(security_days(&config, &bars)[2].flags.spike_down);

        bars[2].volume = 1200.0;
        assert!(!security_days(&config, &bars)[2].flags.spike_down);
    }

    #[test]
    fn spike_needs_full_prior_volume_window() {
        let config = BreadthConfig {
            volume_lookback: 3,
            ..BreadthConfig::default()
        };
        let bars = vec![
            bar(0, 101.0, 99.0, 100.0, 1000.0),
            bar(1, 101.0, 99.0, 100.0, 1000.0),
            bar(2, 110.0, 100.0, 110.0, 9000.0),
        ];
        assert!(!security_days(&config, &bars)[2].flags.spike_up);
    }

    #[test]
    fn flat_range_blocks_spikes() {
        let config = BreadthConfig {
            volume_lookback: 1,
            ..BreadthConfig::default()
        };
        let bars = vec![
            bar(0, 101.0, 99.0, 100.0, 1000.0),
            bar(1, 105.0, 105.0, 105.0, 5000.0),
        ];
        assert!(!security_days(&config, &bars)[1].flags.spike_up);
    }

    #[test]
    fn zero_previous_close_keeps_direction_but_blocks_spikes() {
        let config = BreadthConfig {
            volume_lookback: 1,
            ..BreadthConfig::default()
        };
        let bars = vec![
            bar(0, 1.0, 0.0, 0.0, 1000.0),
            bar(1, 2.0, 0.0, 2.0, 5000.0),
        ];
        let days = security_days(&config, &bars);
        assert!(days[1].flags.advance);
        assert!(!days[1].flags.spike_up);
    }
}
