//! Breadth Core — domain types and the breadth aggregation engine.
//!
//! This crate contains the computational heart of the breadth job:
//! - Domain types (bars, groups, per-group daily counters, checkpoints)
//! - Engine configuration (window sizes, spike thresholds, EMA periods)
//! - Streaming window primitives (running sums, monotonic extremes, EMA)
//! - Per-security indicator stream (causal, one pass per security)
//! - Group aggregator (fan-out of security-day flags into group counters)
//! - Oscillator engine (resumable McClellan smoothing)
//! - Membership index and a deterministic synthetic market
//!
//! Nothing here performs I/O beyond reading TOML files; persistence and
//! orchestration live in `breadth-runner`.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod indicators;
pub mod membership;
pub mod oscillator;
pub mod stream;
pub mod synthetic;

pub use aggregate::{GroupAggregator, GroupSeries};
pub use config::{BreadthConfig, ConfigError};
pub use membership::{MembershipError, MembershipIndex};
pub use oscillator::{OscillatorEngine, SmoothedSeries};
pub use stream::{security_days, DayFlags, IndicatorStream, SecurityDay};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across rayon workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::GroupRegistry>();
        require_sync::<domain::GroupRegistry>();
        require_send::<domain::BreadthRow>();
        require_sync::<domain::BreadthRow>();
        require_send::<domain::Checkpoint>();
        require_sync::<domain::Checkpoint>();

        require_send::<BreadthConfig>();
        require_sync::<BreadthConfig>();
        require_send::<MembershipIndex>();
        require_sync::<MembershipIndex>();
        require_send::<IndicatorStream>();
        require_send::<GroupAggregator>();
        require_sync::<GroupAggregator>();
        require_send::<OscillatorEngine>();
        require_sync::<OscillatorEngine>();
    }

    /// The worked example: closes [10, 11, 9] in a one-member sector.
    #[test]
    fn three_bar_sector_example() {
        use chrono::NaiveDate;
        use domain::{Bar, GroupId};

        let config = BreadthConfig::default();
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars: Vec<Bar> = [10.0, 11.0, 9.0]
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "AAA".into(),
                date: base + chrono::Duration::days(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1_000.0,
            })
            .collect();

        let mut agg = GroupAggregator::for_config(&config);
        agg.add_security(&config, &[GroupId(1)], &bars);
        let series = agg.series(GroupId(1)).unwrap();

        let day3 = &series[&bars[2].date];
        assert_eq!((day3.adv, day3.dec, day3.total), (0, 1, 1));

        // Smoothing only day 3 (the first-ever smoothed date for the group).
        let cp = domain::Checkpoint::cold(bars[1].date);
        let out = OscillatorEngine::from_config(&config).smooth(series, Some(&cp));
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].ad_value, -1);
        assert_eq!(out.rows[0].ema_short, Some(-1.0));
        assert_eq!(out.rows[0].ema_long, Some(-1.0));
        assert_eq!(out.rows[0].mcclellan, Some(0.0));
    }
}
