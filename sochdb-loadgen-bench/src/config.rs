//! Evaluation configuration: defaults, YAML/TOML loading and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::generators::PayloadBounds;
use crate::{BenchError, BenchResult};

/// Everything the evaluation driver needs to know.
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Repetitions of every (writers, readers) combination.
    pub runs: usize,
    /// Execute one discarded run per backend before measuring.
    pub warm_up: bool,
    /// Items written and read per worker during warm-up.
    pub warm_up_amount: u64,
    /// Pause between runs so the previous run's teardown does not bleed
    /// into the next one.
    pub settle_between_runs: bool,
    pub settle_millis: u64,
    /// Sweep upper bound for writer threads (swept from 1).
    pub writers: usize,
    /// Sweep upper bound for reader threads (swept from 0).
    pub readers: usize,
    pub writes_per_thread: u64,
    pub reads_per_thread: u64,
    pub payload_min: usize,
    pub payload_max: usize,
    /// Generator key, see [`crate::registry::Registry`].
    pub generator: String,
    /// Backend keys, evaluated in order.
    pub backends: Vec<String>,
    /// Writers draw all items before their timer starts.
    pub pregenerate: bool,
    /// Worker pool size; defaults to the pool's own sizing.
    pub threads: Option<usize>,
    pub seed: u64,
    /// Root for on-disk backends; a temporary directory when unset.
    pub data_dir: Option<PathBuf>,
    /// Event store: flush the write buffer every N appends.
    pub flush_every: usize,
    /// Event store: fsync segments on close.
    pub sync_on_close: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            runs: 10,
            warm_up: true,
            warm_up_amount: 10_000,
            settle_between_runs: true,
            settle_millis: 250,
            writers: 1,
            readers: 0,
            writes_per_thread: 1_000_000,
            reads_per_thread: 1_000_000,
            payload_min: 40,
            payload_max: 120,
            generator: "message".to_string(),
            backends: vec!["event_store".to_string()],
            pregenerate: false,
            threads: None,
            seed: 42,
            data_dir: None,
            flush_every: 1024,
            sync_on_close: false,
        }
    }
}

impl EvalConfig {
    /// Load from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BenchError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| BenchError::Config(format!("Failed to parse YAML: {}", e))),
            Some("toml") => toml::from_str(&content)
                .map_err(|e| BenchError::Config(format!("Failed to parse TOML: {}", e))),
            other => Err(BenchError::Config(format!(
                "Unsupported config format {:?} (expected .yaml, .yml or .toml)",
                other.unwrap_or("")
            ))),
        }
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.runs == 0 {
            return Err(BenchError::Config("runs must be at least 1".into()));
        }
        if self.writers == 0 {
            return Err(BenchError::Config("writers must be at least 1".into()));
        }
        if self.writes_per_thread == 0 {
            return Err(BenchError::Config("writes_per_thread must be at least 1".into()));
        }
        if self.backends.is_empty() {
            return Err(BenchError::Config("no backends selected".into()));
        }
        if self.payload_min > self.payload_max {
            return Err(BenchError::Config(format!(
                "payload_min ({}) exceeds payload_max ({})",
                self.payload_min, self.payload_max
            )));
        }
        if self.threads == Some(0) {
            return Err(BenchError::Config("threads must be at least 1".into()));
        }
        Ok(())
    }

    pub fn payload(&self) -> PayloadBounds {
        PayloadBounds::new(self.payload_min, self.payload_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = EvalConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.runs, 10);
        assert_eq!(cfg.payload(), PayloadBounds::new(40, 120));
        assert_eq!(cfg.generator, "message");
    }

    #[test]
    fn test_parse_yaml_with_partial_fields() {
        let yaml = r#"
runs: 2
writers: 3
readers: 1
backends: [memory, sqlite]
generator: string
"#;
        let cfg: EvalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.runs, 2);
        assert_eq!(cfg.writers, 3);
        assert_eq!(cfg.backends, vec!["memory", "sqlite"]);
        assert_eq!(cfg.writes_per_thread, 1_000_000);
        assert!(cfg.warm_up);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "runs = 3\nwarm_up = false\npayload_min = 8\npayload_max = 16").unwrap();

        let cfg = EvalConfig::load(file.path()).unwrap();
        assert_eq!(cfg.runs, 3);
        assert!(!cfg.warm_up);
        assert_eq!(cfg.payload(), PayloadBounds::new(8, 16));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(EvalConfig::load(file.path()), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_payload() {
        let cfg = EvalConfig {
            payload_min: 10,
            payload_max: 5,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BenchError::Config(msg)) if msg.contains("payload_min")));
    }

    #[test]
    fn test_validate_rejects_empty_backends() {
        let cfg = EvalConfig {
            backends: vec![],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
