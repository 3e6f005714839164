//! Matcher throughput benchmarks: resting-order insertion, a crossing
//! taker walking a deep opposite ladder, and cancel-by-id.
//!
//! Grounded on the teacher's `benches/order_book/mass_cancel.rs`
//! (`criterion_group!`/`criterion_main!`, `iter_with_setup` to exclude
//! population cost from the measured operation, `BenchmarkId` sweeps over
//! order counts) narrowed to one file since this engine's benchmarkable
//! surface is the matcher rather than a standalone order book plus
//! cancel/serialization suites — the teacher's HDR-histogram HFT scenario
//! suite (iceberg sweep, allocation counting) has no counterpart here.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use matching_engine::config::{EngineConfig, PairConfig};
use matching_engine::decimal::Decimal;
use matching_engine::orderbook::sequencer::EngineCommand;
use matching_engine::orderbook::{Book, Matcher, OrderKind, Side, TimeInForce};
use std::hint::black_box;

fn pair_config() -> PairConfig {
    PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap()
}

fn submit(user_id: &str, side: Side, price: &str, qty: &str) -> EngineCommand {
    EngineCommand::Submit {
        pair: "BTC-USD".into(),
        user_id: user_id.into(),
        side,
        kind: OrderKind::Limit,
        qty: Decimal::parse_with_scale(qty, 4).unwrap(),
        limit_price: Some(Decimal::parse_with_scale(price, 2).unwrap()),
        stop_price: None,
        time_in_force: TimeInForce::Gtc,
        expires_at: None,
        client_order_id: None,
    }
}

fn bench_resting_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("Matcher - Rest GTC Limit Orders");
    for &depth in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("insert", depth), &depth, |b, &depth| {
            b.iter_with_setup(
                || Matcher::new(Book::new(pair_config()), EngineConfig::default()),
                |matcher| {
                    for i in 0..depth {
                        let price = format!("{}.00", 10_000 - (i % 5_000));
                        let cmd = submit("bencher", Side::Buy, &price, "1");
                        black_box(matcher.handle(cmd, i as u64));
                    }
                },
            );
        });
    }
    group.finish();
}

fn bench_crossing_taker(c: &mut Criterion) {
    let mut group = c.benchmark_group("Matcher - Cross a Deep Ladder");
    for &depth in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("sweep", depth), &depth, |b, &depth| {
            b.iter_with_setup(
                || {
                    let matcher = Matcher::new(Book::new(pair_config()), EngineConfig::default());
                    for i in 0..depth {
                        let cmd = submit(&format!("maker{i}"), Side::Sell, "100.00", "1");
                        matcher.handle(cmd, i as u64);
                    }
                    matcher
                },
                |matcher| {
                    let cmd = submit("taker", Side::Buy, "100.00", &depth.to_string());
                    black_box(matcher.handle(cmd, depth as u64));
                },
            );
        });
    }
    group.finish();
}

fn bench_cancel_by_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("Matcher - Cancel");
    for &depth in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("cancel_all", depth), &depth, |b, &depth| {
            b.iter_with_setup(
                || {
                    let matcher = Matcher::new(Book::new(pair_config()), EngineConfig::default());
                    let mut order_ids = Vec::with_capacity(depth);
                    for i in 0..depth {
                        let price = format!("{}.00", 10_000 - (i % 5_000));
                        let events = matcher.handle(submit("bencher", Side::Buy, &price, "1"), i as u64);
                        for event in events {
                            if let matching_engine::orderbook::sequencer::EventPayload::OrderAccepted {
                                order_id,
                                ..
                            } = event.payload
                            {
                                order_ids.push(order_id);
                            }
                        }
                    }
                    (matcher, order_ids)
                },
                |(matcher, order_ids)| {
                    for (i, order_id) in order_ids.into_iter().enumerate() {
                        black_box(matcher.handle(
                            EngineCommand::Cancel {
                                pair: "BTC-USD".into(),
                                order_id,
                                user_id: "bencher".into(),
                            },
                            (depth + i) as u64,
                        ));
                    }
                },
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_resting_insertion,
    bench_crossing_taker,
    bench_cancel_by_id,
);
criterion_main!(benches);
