//! Driver sweeps and report export.

use std::sync::Arc;

use sochdb_loadgen::{WorkerPool, WorkerPoolConfig};
use sochdb_loadgen_bench::config::EvalConfig;
use sochdb_loadgen_bench::evaluation::Evaluation;
use sochdb_loadgen_bench::registry::Registry;
use sochdb_loadgen_bench::report::{self, CSV_HEADER};
use sochdb_loadgen_bench::{BenchError, BenchSuite, SystemInfo};
use tempfile::TempDir;

fn small_config(backends: &[&str]) -> EvalConfig {
    EvalConfig {
        runs: 2,
        warm_up: true,
        warm_up_amount: 20,
        settle_between_runs: false,
        writers: 2,
        readers: 1,
        writes_per_thread: 50,
        reads_per_thread: 40,
        generator: "bigint".to_string(),
        backends: backends.iter().map(|s| s.to_string()).collect(),
        ..EvalConfig::default()
    }
}

fn pool() -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(WorkerPoolConfig::with_threads(4)).unwrap())
}

#[test]
fn test_sweep_covers_every_combination() {
    let tmp = TempDir::new().unwrap();
    let cfg = small_config(&["memory"]);
    let registry = Registry::with_defaults();

    let records = Evaluation::new(&cfg, &registry, pool(), tmp.path()).run().unwrap();

    // writers 1..=2 × readers 0..=1 × 2 runs
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|r| r.is_success()));

    // Warm-up consumed id 1.
    let ids: Vec<u64> = records.iter().map(|r| r.run_id).collect();
    assert_eq!(ids, (2..=9).collect::<Vec<_>>());

    let first = records[0].summary.as_ref().unwrap();
    assert_eq!((first.writer_count, first.reader_count), (1, 0));
    assert_eq!(first.total_writing_ops, 50);
    assert_eq!(first.item_type, "BigInt");

    let last = records[7].summary.as_ref().unwrap();
    assert_eq!((last.writer_count, last.reader_count), (2, 1));
    assert_eq!(last.total_writing_ops, 100);
    assert_eq!(last.total_reading_ops, 40);
}

#[test]
fn test_write_only_backend_sweeps_writers_only() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = small_config(&["file_log", "event_store"]);
    cfg.warm_up = false;
    cfg.runs = 1;
    let registry = Registry::with_defaults();

    let records = Evaluation::new(&cfg, &registry, pool(), tmp.path()).run().unwrap();

    let file_log: Vec<_> = records.iter().filter(|r| r.backend == "file_log").collect();
    let event_store: Vec<_> = records.iter().filter(|r| r.backend == "event_store").collect();
    assert_eq!(file_log.len(), 2);
    assert!(file_log.iter().all(|r| r.readers == 0));
    assert_eq!(event_store.len(), 4);
    assert!(records.iter().all(|r| r.is_success()));
}

#[test]
fn test_event_store_sweep_with_readers_and_default_flush() {
    let tmp = TempDir::new().unwrap();
    let cfg = EvalConfig {
        runs: 1,
        warm_up: true,
        warm_up_amount: 10,
        settle_between_runs: false,
        writers: 2,
        readers: 2,
        writes_per_thread: 30,
        reads_per_thread: 30,
        generator: "message".to_string(),
        backends: vec!["event_store".to_string()],
        ..EvalConfig::default()
    };
    assert_eq!(cfg.flush_every, 1024);
    let registry = Registry::with_defaults();

    let records = Evaluation::new(&cfg, &registry, pool(), tmp.path()).run().unwrap();

    // writers 1..=2 × readers 0..=2
    assert_eq!(records.len(), 6);
    for record in &records {
        assert!(record.is_success(), "run {} failed: {:?}", record.run_id, record.error);
    }
    let last = records[5].summary.as_ref().unwrap();
    assert_eq!((last.writer_count, last.reader_count), (2, 2));
    assert_eq!(last.total_reading_ops, 60);
}

#[test]
fn test_unknown_backend_fails_before_any_run() {
    let tmp = TempDir::new().unwrap();
    let cfg = small_config(&["memory", "cassandra"]);
    let registry = Registry::with_defaults();

    let err = Evaluation::new(&cfg, &registry, pool(), tmp.path())
        .run()
        .unwrap_err();
    assert!(matches!(err, BenchError::Config(ref msg) if msg.contains("cassandra")));
}

#[test]
fn test_export_csv_and_json() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = small_config(&["memory"]);
    cfg.warm_up = false;
    cfg.runs = 1;
    cfg.readers = 0;
    cfg.writers = 1;
    let registry = Registry::with_defaults();

    let pool = pool();
    let records = Evaluation::new(&cfg, &registry, pool.clone(), tmp.path()).run().unwrap();
    pool.join();
    let suite = BenchSuite {
        system_info: SystemInfo::collect(),
        config: cfg,
        pool: pool.metrics().snapshot(),
        records,
    };

    let csv_path = tmp.path().join("out.csv");
    let json_path = tmp.path().join("out.json");
    report::export_csv(&suite, &csv_path).unwrap();
    report::export_json(&suite, &json_path).unwrap();

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
    let row = lines.next().unwrap();
    assert!(row.starts_with("1,memory,BigInt,0,1,"));
    assert!(lines.next().is_none());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["records"].as_array().unwrap().len(), 1);
    assert_eq!(json["config"]["generator"], "bigint");
    // One writer task, no panics.
    assert_eq!(json["pool"]["tasks_submitted"], 1);
    assert_eq!(json["pool"]["tasks_panicked"], 0);
}
