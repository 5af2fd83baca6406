//! SochDB Load Generator
//!
//! Usage:
//!   sochdb-loadgen                                   # defaults: message items, event_store
//!   sochdb-loadgen --config eval.yaml                # load a YAML/TOML config
//!   sochdb-loadgen --backend memory,sqlite --writers 4 --readers 2 --runs 3
//!   sochdb-loadgen --export results                  # write CSV + JSON

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use sochdb_loadgen::{WorkerPool, WorkerPoolConfig};
use sochdb_loadgen_bench::config::EvalConfig;
use sochdb_loadgen_bench::evaluation::Evaluation;
use sochdb_loadgen_bench::registry::Registry;
use sochdb_loadgen_bench::{report, BenchResult, BenchSuite, SystemInfo};
use tempfile::TempDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sochdb-loadgen", about = "Concurrent write/read load generator for event stores")]
struct Cli {
    /// Evaluation config file (.yaml, .yml or .toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Repetitions per (writers, readers) combination.
    #[arg(long)]
    runs: Option<usize>,

    /// Maximum writer threads; swept from 1.
    #[arg(long)]
    writers: Option<usize>,

    /// Maximum reader threads; swept from 0.
    #[arg(long)]
    readers: Option<usize>,

    /// Items each writer persists.
    #[arg(long)]
    writes_per_thread: Option<u64>,

    /// Items each reader reads.
    #[arg(long)]
    reads_per_thread: Option<u64>,

    /// Minimum payload length for sized generators.
    #[arg(long)]
    payload_min: Option<usize>,

    /// Maximum payload length for sized generators.
    #[arg(long)]
    payload_max: Option<usize>,

    /// Item generator (string, bigint, node_urn, log_line, message).
    #[arg(long)]
    generator: Option<String>,

    /// Backends to evaluate (comma-separated: event_store, memory, sqlite, file_log).
    #[arg(long, value_delimiter = ',')]
    backend: Vec<String>,

    /// Skip the warm-up run.
    #[arg(long)]
    no_warm_up: bool,

    /// Do not pause between runs.
    #[arg(long)]
    no_settle: bool,

    /// Writers generate all items before their timer starts.
    #[arg(long)]
    pregenerate: bool,

    /// Worker pool size.
    #[arg(long)]
    threads: Option<usize>,

    /// Seed for item generation and reader assignment.
    #[arg(long)]
    seed: Option<u64>,

    /// Export directory for CSV + JSON results.
    #[arg(long)]
    export: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut EvalConfig) {
        if let Some(v) = self.runs {
            cfg.runs = v;
        }
        if let Some(v) = self.writers {
            cfg.writers = v;
        }
        if let Some(v) = self.readers {
            cfg.readers = v;
        }
        if let Some(v) = self.writes_per_thread {
            cfg.writes_per_thread = v;
        }
        if let Some(v) = self.reads_per_thread {
            cfg.reads_per_thread = v;
        }
        if let Some(v) = self.payload_min {
            cfg.payload_min = v;
        }
        if let Some(v) = self.payload_max {
            cfg.payload_max = v;
        }
        if let Some(v) = &self.generator {
            cfg.generator = v.to_lowercase();
        }
        if !self.backend.is_empty() {
            cfg.backends = self.backend.iter().map(|s| s.to_lowercase()).collect();
        }
        if self.no_warm_up {
            cfg.warm_up = false;
        }
        if self.no_settle {
            cfg.settle_between_runs = false;
        }
        if self.pregenerate {
            cfg.pregenerate = true;
        }
        if self.threads.is_some() {
            cfg.threads = self.threads;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
    }
}

fn main() -> BenchResult<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cfg = match &cli.config {
        Some(path) => EvalConfig::load(path)?,
        None => EvalConfig::default(),
    };
    cli.apply(&mut cfg);
    cfg.validate()?;

    println!(
        "\n{}",
        "╔══════════════════════════════════════════════════════╗"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "║     SochDB Load Generator                           ║"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════╝"
            .bold()
            .blue()
    );
    println!(
        "  Generator: {}  Backends: {}  Writers: 1..={}  Readers: 0..={}  Runs: {}",
        cfg.generator,
        cfg.backends.join(", "),
        cfg.writers,
        cfg.readers,
        cfg.runs
    );

    // Keep the temporary directory alive until every run is done.
    let tmp;
    let data_root = match &cfg.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => {
            tmp = TempDir::new()?;
            tmp.path().to_path_buf()
        }
    };

    let pool_config = match cfg.threads {
        Some(n) => WorkerPoolConfig::with_threads(n),
        None => WorkerPoolConfig::default(),
    };
    // Every run of the sweep needs writers + readers concurrently resident.
    let needed = cfg.writers + cfg.readers;
    if pool_config.num_threads < needed {
        tracing::warn!(
            threads = pool_config.num_threads,
            needed,
            "Worker pool smaller than the largest run; workers will queue"
        );
    }
    let pool = Arc::new(WorkerPool::new(pool_config).map_err(sochdb_loadgen::RunError::from)?);

    let registry = Registry::with_defaults();
    let records = Evaluation::new(&cfg, &registry, pool.clone(), data_root).run()?;
    pool.join();

    let suite = BenchSuite {
        system_info: SystemInfo::collect(),
        config: cfg,
        pool: pool.metrics().snapshot(),
        records,
    };

    report::print_suite(&suite);

    if let Some(ref dir) = cli.export {
        let export_dir = Path::new(dir);
        std::fs::create_dir_all(export_dir)?;
        report::export_csv(&suite, &export_dir.join("loadgen_results.csv"))?;
        report::export_json(&suite, &export_dir.join("loadgen_results.json"))?;
    }

    Ok(())
}
