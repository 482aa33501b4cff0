//! Group aggregator — fans per-security day flags out into group counters.
//!
//! Storage is an arena keyed by integer group id, each holding a date-ordered
//! map of counters. Partial aggregators built on different workers combine
//! with [`GroupAggregator::merge`]; counter addition is associative and
//! commutative, so any fold/reduce order gives the same result.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::config::BreadthConfig;
use crate::domain::{Bar, GroupDayCounters, GroupId};
use crate::stream::{DayFlags, IndicatorStream};

/// Date-ordered counters of a single group.
pub type GroupSeries = BTreeMap<NaiveDate, GroupDayCounters>;

#[derive(Debug, Clone, Default)]
pub struct GroupAggregator {
    ma_window_count: usize,
    groups: BTreeMap<GroupId, GroupSeries>,
    securities: usize,
}

impl GroupAggregator {
    pub fn new(ma_window_count: usize) -> Self {
        Self {
            ma_window_count,
            groups: BTreeMap::new(),
            securities: 0,
        }
    }

    pub fn for_config(config: &BreadthConfig) -> Self {
        Self::new(config.ma_windows.len())
    }

    /// Count one security-day in every listed group.
    pub fn record(&mut self, group_ids: &[GroupId], date: NaiveDate, flags: &DayFlags) {
        let window_count = self.ma_window_count;
        for gid in group_ids {
            self.groups
                .entry(*gid)
                .or_default()
                .entry(date)
                .or_insert_with(|| GroupDayCounters::new(window_count))
                .record(flags);
        }
    }

    /// Stream a security's bars and record every day into its groups.
    ///
    /// Securities without groups or bars are skipped before any window
    /// state is built. Returns the number of days recorded.
    pub fn add_security(
        &mut self,
        config: &BreadthConfig,
        group_ids: &[GroupId],
        bars: &[Bar],
    ) -> usize {
        if group_ids.is_empty() || bars.is_empty() {
            return 0;
        }
        let mut stream = IndicatorStream::new(config);
        for bar in bars {
            let flags = stream.next_day(bar);
            self.record(group_ids, bar.date, &flags);
        }
        self.securities += 1;
        bars.len()
    }

    /// Fold another partial aggregator into this one.
    pub fn merge(mut self, other: GroupAggregator) -> Self {
        self.securities += other.securities;
        self.ma_window_count = self.ma_window_count.max(other.ma_window_count);
        for (gid, series) in other.groups {
            let mine = self.groups.entry(gid).or_default();
            for (date, counters) in series {
                match mine.get_mut(&date) {
                    Some(existing) => existing.merge(&counters),
                    None => {
                        mine.insert(date, counters);
                    }
                }
            }
        }
        self
    }

    pub fn series(&self, gid: GroupId) -> Option<&GroupSeries> {
        self.groups.get(&gid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &GroupSeries)> {
        self.groups.iter().map(|(gid, s)| (*gid, s))
    }

    pub fn into_groups(self) -> BTreeMap<GroupId, GroupSeries> {
        self.groups
    }

    /// Number of securities that contributed at least one day.
    pub fn security_count(&self) -> usize {
        self.securities
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of (group, date) cells.
    pub fn cell_count(&self) -> usize {
        self.groups.values().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn fan_out_counts_each_group_independently() {
        let mut agg = GroupAggregator::new(1);
        let flags = DayFlags {
            advance: true,
            spike_up: true,
            ..DayFlags::default()
        };
        agg.record(&[GroupId(1), GroupId(2), GroupId(3)], d(2), &flags);

        for gid in [1, 2, 3] {
            let c = &agg.series(GroupId(gid)).unwrap()[&d(2)];
            assert_eq!(c.total, 1);
            assert_eq!(c.adv, 1);
            assert_eq!(c.spike_up, 1);
        }
    }

    #[test]
    fn security_without_groups_contributes_nothing() {
        let mut agg = GroupAggregator::for_config(&BreadthConfig::default());
        let n = agg.add_security(&BreadthConfig::default(), &[], &make_bars(&[1.0, 2.0]));
        assert_eq!(n, 0);
        assert_eq!(agg.group_count(), 0);
        assert_eq!(agg.security_count(), 0);
    }

    #[test]
    fn totals_count_members_with_a_bar() {
        let config = BreadthConfig::default();
        let mut agg = GroupAggregator::for_config(&config);
        agg.add_security(&config, &[GroupId(1)], &make_bars(&[10.0, 11.0, 12.0]));
        agg.add_security(&config, &[GroupId(1)], &make_bars(&[10.0, 9.0]));

        let series = agg.series(GroupId(1)).unwrap();
        let totals: Vec<u32> = series.values().map(|c| c.total).collect();
        assert_eq!(totals, vec![2, 2, 1]);
        let day2 = series.values().nth(1).unwrap();
        assert_eq!((day2.adv, day2.dec), (1, 1));
    }

    #[test]
    fn merge_matches_single_pass() {
        let config = BreadthConfig::default();
        let a = make_bars(&[10.0, 11.0, 10.5, 12.0]);
        let b = make_bars(&[20.0, 19.0, 19.0, 21.0]);

        let mut serial = GroupAggregator::for_config(&config);
        serial.add_security(&config, &[GroupId(1), GroupId(2)], &a);
        serial.add_security(&config, &[GroupId(1)], &b);

        let mut left = GroupAggregator::for_config(&config);
        left.add_security(&config, &[GroupId(1), GroupId(2)], &a);
        let mut right = GroupAggregator::for_config(&config);
        right.add_security(&config, &[GroupId(1)], &b);
        let merged = right.merge(left);

        assert_eq!(merged.into_groups(), serial.into_groups());
    }
}
