//! Dispatch throughput benchmarks on virtual time.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use floor_core::engine::{DispatchConfig, DispatchEngine};
use floor_core::ipc::{decode_message, encode_message, IpcMessage};
use floor_core::scheduler::{ManualClock, PriorityClass};

fn engine(workers: usize) -> (DispatchEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let engine = DispatchEngine::new(DispatchConfig::default().immediate(), clock.clone(), clock.clone());
    for _ in 0..workers {
        engine.add_worker();
    }
    (engine, clock)
}

fn class_for(i: u64) -> PriorityClass {
    if i % 3 == 0 {
        PriorityClass::Vip
    } else {
        PriorityClass::Normal
    }
}

fn bench_create_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_order");

    for backlog in [10u64, 100, 1000] {
        group.throughput(Throughput::Elements(backlog));
        group.bench_with_input(BenchmarkId::new("backlog", backlog), &backlog, |b, &n| {
            b.iter(|| {
                let (engine, _clock) = engine(0);
                for i in 0..n {
                    black_box(engine.create_order(class_for(i)));
                }
            })
        });
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_backlog");

    for workers in [1usize, 4, 16] {
        let orders = 200u64;
        group.throughput(Throughput::Elements(orders));
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &w| {
            b.iter(|| {
                let (engine, clock) = engine(w);
                for i in 0..orders {
                    engine.create_order(class_for(i));
                }
                while !engine.pending_orders().is_empty() || !engine.processing_orders().is_empty() {
                    clock.advance(Duration::from_secs(10));
                }
                black_box(engine.complete_orders().len())
            })
        });
    }

    group.finish();
}

fn bench_status_encode(c: &mut Criterion) {
    let (engine, _clock) = engine(8);
    for i in 0..500 {
        engine.create_order(class_for(i));
    }
    let message = IpcMessage::StatusReport(engine.status());
    let max = 16 * 1024 * 1024;

    c.bench_function("encode_status_report", |b| {
        b.iter(|| encode_message(black_box(&message), max))
    });

    let bytes = encode_message(&message, max).unwrap();
    c.bench_function("decode_status_report", |b| {
        b.iter(|| decode_message(black_box(&bytes), max))
    });
}

criterion_group!(benches, bench_create_order, bench_drain, bench_status_encode);
criterion_main!(benches);
