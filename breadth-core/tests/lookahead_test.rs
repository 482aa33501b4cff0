//! Look-ahead contamination tests for the indicator stream and aggregator.
//!
//! No flag or counter on day t may depend on a bar dated after t.
//!
//! Method: compute on a truncated history and on the full history, then
//! assert the shared prefix is identical.

use chrono::NaiveDate;
use breadth_core::domain::{Bar, GroupId};
use breadth_core::synthetic::SyntheticMarket;
use breadth_core::{security_days, BreadthConfig, GroupAggregator};

/// Deterministic pseudo-random walk with occasional volume bursts.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let base_date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.05;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        let high = open.max(close) + 2.0;
        let low = open.min(close) - 2.0;
        let volume = if i % 17 == 0 { 5_000.0 } else { 1_000.0 + (i as f64) * 10.0 };

        bars.push(Bar {
            symbol: "TEST".to_string(),
            date: base_date + chrono::Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
        });
    }

    bars
}

#[test]
fn stream_flags_do_not_look_ahead() {
    let config = BreadthConfig::default();
    let full_bars = make_test_bars(600);

    for truncated_len in [1, 20, 21, 199, 200, 251, 252, 400] {
        let full = security_days(&config, &full_bars);
        let truncated = security_days(&config, &full_bars[..truncated_len]);
        assert_eq!(truncated.len(), truncated_len);
        assert_eq!(
            &full[..truncated_len],
            truncated.as_slice(),
            "flags diverge when history is cut at {truncated_len}"
        );
    }
}

#[test]
fn long_windows_stay_quiet_until_filled() {
    let config = BreadthConfig::default();
    let days = security_days(&config, &make_test_bars(600));
    let last_ma = config.ma_windows.len() - 1;
    assert!(days[..199].iter().all(|d| !d.flags.above_ma(last_ma)));
    assert!(days[..251].iter().all(|d| !d.flags.new_high && !d.flags.new_low));
}

#[test]
fn group_counters_do_not_look_ahead() {
    let config = BreadthConfig::default();
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    let market = SyntheticMarket::new(7, start, 320);
    let (symbols, _) = SyntheticMarket::universe(12, 3).unwrap();
    let histories: Vec<Vec<Bar>> = symbols.iter().map(|s| market.bars_for(s)).collect();
    let cutoff = market.trading_days()[279];

    let mut full = GroupAggregator::for_config(&config);
    let mut truncated = GroupAggregator::for_config(&config);
    for (i, bars) in histories.iter().enumerate() {
        let ids = [GroupId((i % 3) as i64 + 1), GroupId(10)];
        full.add_security(&config, &ids, bars);
        let cut: Vec<Bar> = bars.iter().filter(|b| b.date <= cutoff).cloned().collect();
        truncated.add_security(&config, &ids, &cut);
    }

    for (gid, series) in truncated.iter() {
        let full_series = full.series(gid).unwrap();
        for (date, counters) in series {
            assert_eq!(&full_series[date], counters, "group {gid} on {date}");
        }
    }
}
