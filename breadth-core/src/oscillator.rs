//! Oscillator engine — McClellan smoothing of the advance/decline line.
//!
//! For each group the engine walks the aggregated counters in date order,
//! starting strictly after the group's checkpoint, and applies
//!
//! - ad_value = adv - dec
//! - ema_short / ema_long via the [`Ema`] recurrence, each seeded with the
//!   first smoothed ad_value when the checkpoint has no value for it
//! - mcclellan = ema_short - ema_long
//!
//! The EMA pair is the complete state of the recurrence, so resuming from a
//! stored checkpoint reproduces a cold run over the same history exactly.

use std::ops::Bound;

use crate::aggregate::GroupSeries;
use crate::config::BreadthConfig;
use crate::domain::{BreadthRow, Checkpoint};
use crate::indicators::Ema;

/// Smoothed rows of one group plus the checkpoint they end on.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedSeries {
    pub rows: Vec<BreadthRow>,
    /// `None` when no new dates were smoothed.
    pub checkpoint: Option<Checkpoint>,
}

impl SmoothedSeries {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OscillatorEngine {
    short_period: usize,
    long_period: usize,
}

impl OscillatorEngine {
    pub fn new(short_period: usize, long_period: usize) -> Self {
        assert!(
            short_period >= 1 && long_period >= 1,
            "EMA periods must be >= 1"
        );
        Self {
            short_period,
            long_period,
        }
    }

    pub fn from_config(config: &BreadthConfig) -> Self {
        Self::new(config.ema_short, config.ema_long)
    }

    /// Smooth every date after `checkpoint` (or all dates without one).
    ///
    /// An EMA the checkpoint has no value for restarts cold on the first
    /// date after it.
    pub fn smooth(&self, series: &GroupSeries, checkpoint: Option<&Checkpoint>) -> SmoothedSeries {
        let (lower, short_prev, long_prev) = match checkpoint {
            Some(cp) => (Bound::Excluded(cp.date), cp.ema_short, cp.ema_long),
            None => (Bound::Unbounded, None, None),
        };
        let mut short = Ema::resume(self.short_period, short_prev);
        let mut long = Ema::resume(self.long_period, long_prev);

        let rows: Vec<BreadthRow> = series
            .range((lower, Bound::Unbounded))
            .map(|(date, counters)| {
                let ad_value = counters.ad_value();
                let x = ad_value as f64;
                let ema_short = short.update(x);
                let ema_long = long.update(x);
                BreadthRow {
                    date: *date,
                    counters: counters.clone(),
                    ad_value,
                    ema_short: Some(ema_short),
                    ema_long: Some(ema_long),
                    mcclellan: Some(ema_short - ema_long),
                }
            })
            .collect();

        let checkpoint = rows.last().map(BreadthRow::checkpoint);
        SmoothedSeries { rows, checkpoint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GroupDayCounters;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(ad: &[(u32, u32)]) -> GroupSeries {
        ad.iter()
            .enumerate()
            .map(|(i, &(adv, dec))| {
                let mut c = GroupDayCounters::new(5);
                c.total = adv + dec;
                c.adv = adv;
                c.dec = dec;
                (d(i as u32 + 1), c)
            })
            .collect()
    }

    #[test]
    fn cold_start_seeds_both_emas() {
        let engine = OscillatorEngine::new(19, 39);
        let out = engine.smooth(&series(&[(0, 1)]), None);
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.ad_value, -1);
        assert_eq!(row.ema_short, Some(-1.0));
        assert_eq!(row.ema_long, Some(-1.0));
        assert_eq!(row.mcclellan, Some(0.0));
    }

    #[test]
    fn second_day_applies_recurrence() {
        let engine = OscillatorEngine::new(19, 39);
        let out = engine.smooth(&series(&[(0, 0), (10, 0)]), None);
        let row = &out.rows[1];
        // 0 + 0.1 * 10 and 0 + 0.05 * 10
        assert!((row.ema_short.unwrap() - 1.0).abs() < 1e-12);
        assert!((row.ema_long.unwrap() - 0.5).abs() < 1e-12);
        assert!((row.mcclellan.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn resume_matches_cold_run_bit_for_bit() {
        let engine = OscillatorEngine::new(19, 39);
        let s = series(&[(5, 2), (1, 7), (3, 3), (9, 0), (2, 6), (4, 1)]);
        let cold = engine.smooth(&s, None);

        for split in 0..cold.rows.len() {
            let cp = cold.rows[split].checkpoint();
            let resumed = engine.smooth(&s, Some(&cp));
            assert_eq!(resumed.rows.len(), cold.rows.len() - split - 1);
            for (r, c) in resumed.rows.iter().zip(&cold.rows[split + 1..]) {
                assert_eq!(r.date, c.date);
                assert_eq!(r.ema_short.unwrap().to_bits(), c.ema_short.unwrap().to_bits());
                assert_eq!(r.ema_long.unwrap().to_bits(), c.ema_long.unwrap().to_bits());
                assert_eq!(r.mcclellan.unwrap().to_bits(), c.mcclellan.unwrap().to_bits());
            }
        }
    }

    #[test]
    fn checkpoint_at_last_date_yields_nothing() {
        let engine = OscillatorEngine::new(19, 39);
        let s = series(&[(1, 0), (0, 1)]);
        let cold = engine.smooth(&s, None);
        let out = engine.smooth(&s, cold.checkpoint.as_ref());
        assert!(out.is_empty());
        assert!(out.checkpoint.is_none());
    }

    #[test]
    fn stateless_checkpoint_restarts_cold_after_its_date() {
        let engine = OscillatorEngine::new(19, 39);
        let s = series(&[(1, 0), (0, 4), (2, 0)]);
        let out = engine.smooth(&s, Some(&Checkpoint::cold(d(1))));
        assert_eq!(out.rows[0].date, d(2));
        assert_eq!(out.rows[0].ema_short, Some(-4.0));
        assert_eq!(out.rows[0].ema_long, Some(-4.0));
    }

    #[test]
    fn each_ema_resumes_independently() {
        let engine = OscillatorEngine::new(19, 39);
        let s = series(&[(1, 0), (10, 0)]);
        let cp = Checkpoint {
            date: d(1),
            ema_short: Some(2.0),
            ema_long: None,
        };
        let row = &engine.smooth(&s, Some(&cp)).rows[0];
        // Short continues: 2 + 0.1 * (10 - 2). Long seeds from ad_value.
        assert!((row.ema_short.unwrap() - 2.8).abs() < 1e-12);
        assert_eq!(row.ema_long, Some(10.0));
        assert!((row.mcclellan.unwrap() - (2.8 - 10.0)).abs() < 1e-12);

        let cp = Checkpoint {
            date: d(1),
            ema_short: None,
            ema_long: Some(4.0),
        };
        let row = &engine.smooth(&s, Some(&cp)).rows[0];
        assert_eq!(row.ema_short, Some(10.0));
        assert!((row.ema_long.unwrap() - 4.3).abs() < 1e-12);
    }

    #[test]
    fn new_checkpoint_is_last_row() {
        let engine = OscillatorEngine::new(19, 39);
        let out = engine.smooth(&series(&[(1, 0), (0, 1), (3, 1)]), None);
        let cp = out.checkpoint.unwrap();
        let last = out.rows.last().unwrap();
        assert_eq!(cp.date, last.date);
        assert_eq!(cp.ema_short, last.ema_short);
        assert_eq!(cp.ema_long, last.ema_long);
    }
}
