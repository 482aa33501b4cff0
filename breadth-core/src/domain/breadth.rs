//! Per-(group, date) breadth aggregates and the smoothing checkpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stream::DayFlags;

/// Counters for one group on one date.
///
/// Each counter is the number of member securities with a bar on that date
/// for which the corresponding indicator held. `above_ma` is aligned with the
/// configured moving-average windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDayCounters {
    pub total: u32,
    pub adv: u32,
    pub dec: u32,
    pub new_high_52w: u32,
    pub new_low_52w: u32,
    pub above_ma: Vec<u32>,
    pub spike_up: u32,
    pub spike_down: u32,
}

impl GroupDayCounters {
    pub fn new(ma_window_count: usize) -> Self {
        Self {
            above_ma: vec![0; ma_window_count],
            ..Self::default()
        }
    }

    /// Count one security-day.
    pub fn record(&mut self, flags: &DayFlags) {
        self.total += 1;
        self.adv += u32::from(flags.advance);
        self.dec += u32::from(flags.decline);
        self.new_high_52w += u32::from(flags.new_high);
        self.new_low_52w += u32::from(flags.new_low);
        for (i, count) in self.above_ma.iter_mut().enumerate() {
            *count += u32::from(flags.above_ma(i));
        }
        self.spike_up += u32::from(flags.spike_up);
        self.spike_down += u32::from(flags.spike_down);
    }

    /// Counter-wise addition of another partial aggregate for the same key.
    pub fn merge(&mut self, other: &GroupDayCounters) {
        self.total += other.total;
        self.adv += other.adv;
        self.dec += other.dec;
        self.new_high_52w += other.new_high_52w;
        self.new_low_52w += other.new_low_52w;
        if self.above_ma.len() < other.above_ma.len() {
            self.above_ma.resize(other.above_ma.len(), 0);
        }
        for (mine, theirs) in self.above_ma.iter_mut().zip(&other.above_ma) {
            *mine += theirs;
        }
        self.spike_up += other.spike_up;
        self.spike_down += other.spike_down;
    }

    /// Advances minus declines.
    pub fn ad_value(&self) -> i64 {
        i64::from(self.adv) - i64::from(self.dec)
    }
}

/// Latest persisted smoothing position of a group.
///
/// Each EMA resumes on its own: a missing value (a row written before the
/// EMA columns existed) seeds that EMA from the next smoothed ad_value while
/// the other continues its recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub date: NaiveDate,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
}

impl Checkpoint {
    /// A checkpoint carrying a date but no smoothing state.
    pub fn cold(date: NaiveDate) -> Self {
        Self {
            date,
            ema_short: None,
            ema_long: None,
        }
    }
}

/// One fully smoothed row, ready to persist under `(group_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthRow {
    pub date: NaiveDate,
    pub counters: GroupDayCounters,
    pub ad_value: i64,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub mcclellan: Option<f64>,
}

impl BreadthRow {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            date: self.date,
            ema_short: self.ema_short,
            ema_long: self.ema_long,
        }
    }
}
