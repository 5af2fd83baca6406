//! Criterion microbenchmarks for backend appends, generators and small runs.
//!
//! Run with: `cargo bench --bench micro`

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sochdb_loadgen::{
    Backend, BackendHandle, Generator, OpKind, Run, RunId, RunParams, StatsAggregator, TimeUnit,
    WorkerPool, WorkerPoolConfig,
};
use sochdb_loadgen_bench::adapters::{EventStoreBackend, MemoryBackend, SqliteBackend};
use sochdb_loadgen_bench::generators::{MessageGenerator, PayloadBounds};
use tempfile::TempDir;

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for backend_name in ["memory", "event_store", "sqlite"] {
        group.bench_function(BenchmarkId::new(backend_name, 1), |b| {
            let tmp = TempDir::new().unwrap();
            let mut gen = MessageGenerator::new(42, PayloadBounds::default());
            let codec = gen.codec();

            let handle: Box<dyn BackendHandle<_>> = match backend_name {
                "memory" => Box::new(MemoryBackend::new().create(codec).unwrap()),
                "event_store" => Box::new(EventStoreBackend::new(tmp.path()).create(codec).unwrap()),
                "sqlite" => Box::new(SqliteBackend::new(tmp.path()).create(codec).unwrap()),
                _ => unreachable!(),
            };

            b.iter(|| {
                let item = gen.next_item();
                handle.append(&item).unwrap();
            });
            handle.close().unwrap();
        });
    }
    group.finish();
}

fn bench_generators(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    for max in [64usize, 512] {
        group.bench_with_input(BenchmarkId::new("message", max), &max, |b, &max| {
            let mut gen = MessageGenerator::new(7, PayloadBounds::new(max / 2, max));
            b.iter(|| MessageGenerator::serialize(&gen.next_item()));
        });
    }
    group.finish();
}

fn bench_small_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    group.sample_size(10);
    let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::with_threads(4)).unwrap());

    for readers in [0usize, 2] {
        group.bench_function(BenchmarkId::new("memory_2w", readers), |b| {
            let mut gen = MessageGenerator::new(1, PayloadBounds::default());
            let mut id = 0;
            b.iter(|| {
                id += 1;
                let params = RunParams::new(2, readers, 1_000, 1_000).unwrap();
                let mut run =
                    Run::new(RunId(id), params, MemoryBackend::new(), gen.split(), pool.clone())
                        .unwrap();
                run.execute().unwrap()
            });
        });
    }
    group.finish();
}

fn bench_throughput_average(c: &mut Criterion) {
    let stats = StatsAggregator::new();
    for i in 1..=64u64 {
        stats.add_written(i * 1_000, Duration::from_micros(i * 7));
    }

    c.bench_function("avg_ops_per_64", |b| {
        b.iter(|| stats.avg_ops_per(OpKind::Write, TimeUnit::Seconds))
    });
}

criterion_group!(
    benches,
    bench_append,
    bench_generators,
    bench_small_run,
    bench_throughput_average
);
criterion_main!(benches);
