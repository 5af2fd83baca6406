//! Backends, generators, evaluation driver and reporting for sochdb-loadgen.

pub mod adapters;
pub mod config;
pub mod evaluation;
pub mod generators;
pub mod registry;
pub mod report;

use serde::Serialize;
use sochdb_loadgen::{PoolSnapshot, RunError, RunSummary};

use crate::config::EvalConfig;

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ────────────────────────────────────────────────────────────────────────────────
// Evaluation output types
// ────────────────────────────────────────────────────────────────────────────────

/// Outcome of one measured run: its summary, or why it failed.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: u64,
    pub backend: String,
    pub generator: String,
    pub writers: usize,
    pub readers: usize,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn is_success(&self) -> bool {
        self.summary.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchSuite {
    pub system_info: SystemInfo,
    pub config: EvalConfig,
    /// Shared worker pool counters at the end of the sweep.
    pub pool: PoolSnapshot,
    pub records: Vec<RunRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpus: usize,
    pub timestamp: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
            timestamp: epoch_timestamp(),
        }
    }
}

fn epoch_timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}s-since-epoch", secs)
}

/// Milliseconds since the Unix epoch, `0` if the clock is before it.
pub(crate) fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
