//! Criterion benchmarks for breadth hot paths.
//!
//! Benchmarks:
//! 1. Indicator stream over one long history
//! 2. Aggregation of a synthetic universe into sectors and lists
//! 3. McClellan smoothing of one group series

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use breadth_core::domain::{Bar, GroupId};
use breadth_core::synthetic::SyntheticMarket;
use breadth_core::{security_days, BreadthConfig, GroupAggregator, OscillatorEngine};

// ── Helpers ──────────────────────────────────────────────────────────

fn market(days: usize) -> SyntheticMarket {
    SyntheticMarket::new(42, NaiveDate::from_ymd_opt(2015, 1, 5).unwrap(), days)
}

fn universe(symbols: usize, days: usize) -> Vec<(Vec<GroupId>, Vec<Bar>)> {
    let m = market(days);
    let (names, _) = SyntheticMarket::universe(symbols, 11).unwrap();
    names
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut ids = vec![GroupId((i % 11) as i64 + 1)];
            if i % 3 == 0 {
                ids.push(GroupId(100));
            }
            (ids, m.bars_for(s))
        })
        .collect()
}

// ── 1. Indicator stream ──────────────────────────────────────────────

fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_stream");
    let config = BreadthConfig::default();

    for days in [252usize, 1260, 2520] {
        let bars = market(days).bars_for("BENCH");
        group.bench_with_input(BenchmarkId::from_parameter(days), &bars, |b, bars| {
            b.iter(|| security_days(black_box(&config), black_box(bars)))
        });
    }

    group.finish();
}

// ── 2. Aggregation ───────────────────────────────────────────────────

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let config = BreadthConfig::default();

    for symbols in [50usize, 200] {
        let inputs = universe(symbols, 504);
        group.bench_with_input(BenchmarkId::new("symbols_504d", symbols), &inputs, |b, inputs| {
            b.iter(|| {
                let mut agg = GroupAggregator::for_config(&config);
                for (ids, bars) in inputs {
                    agg.add_security(&config, ids, bars);
                }
                black_box(agg.cell_count())
            })
        });
    }

    group.finish();
}

// ── 3. Smoothing ─────────────────────────────────────────────────────

fn bench_smooth(c: &mut Criterion) {
    let mut group = c.benchmark_group("smooth");
    let config = BreadthConfig::default();

    let mut agg = GroupAggregator::for_config(&config);
    for (ids, bars) in universe(100, 2520) {
        agg.add_security(&config, &ids, &bars);
    }
    let series = agg.series(GroupId(100)).cloned().unwrap_or_default();
    let engine = OscillatorEngine::from_config(&config);

    group.bench_function("one_group_2520d", |b| {
        b.iter(|| engine.smooth(black_box(&series), None))
    });

    group.finish();
}

criterion_group!(benches, bench_stream, bench_aggregate, bench_smooth);
criterion_main!(benches);
