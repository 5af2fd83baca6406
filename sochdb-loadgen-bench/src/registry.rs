//! Config keys → generator and backend constructors.
//!
//! Resolution happens once when the driver starts; an unknown key fails with
//! the list of known ones.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::adapters::{EventStoreBackend, FileLogBackend, MemoryBackend, SqliteBackend};
use crate::generators::{
    BigIntGenerator, LogLineGenerator, MessageGenerator, NodeUrnGenerator, PayloadBounds,
    StringGenerator,
};
use crate::{BenchError, BenchResult};

/// Inputs for generator constructors.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorSettings {
    pub seed: u64,
    pub payload: PayloadBounds,
}

/// Inputs for backend constructors.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub root: PathBuf,
    pub flush_every: usize,
    pub sync_on_close: bool,
}

pub enum GeneratorChoice {
    String(StringGenerator),
    BigInt(BigIntGenerator),
    NodeUrn(NodeUrnGenerator),
    LogLine(LogLineGenerator),
    Message(MessageGenerator),
}

#[derive(Debug, Clone)]
pub enum BackendChoice {
    EventStore(EventStoreBackend),
    Memory(MemoryBackend),
    Sqlite(SqliteBackend),
    FileLog(FileLogBackend),
}

impl BackendChoice {
    pub fn supports_iteration(&self) -> bool {
        !matches!(self, BackendChoice::FileLog(_))
    }
}

pub type GeneratorCtor = fn(&GeneratorSettings) -> GeneratorChoice;
pub type BackendCtor = fn(&BackendSettings) -> BackendChoice;

pub struct Registry {
    generators: BTreeMap<&'static str, GeneratorCtor>,
    backends: BTreeMap<&'static str, BackendCtor>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            generators: BTreeMap::new(),
            backends: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register_generator("string", |s| {
            GeneratorChoice::String(StringGenerator::new(s.seed, s.payload))
        });
        registry.register_generator("bigint", |s| {
            GeneratorChoice::BigInt(BigIntGenerator::new(s.seed))
        });
        registry.register_generator("node_urn", |s| {
            GeneratorChoice::NodeUrn(NodeUrnGenerator::new(s.seed))
        });
        registry.register_generator("log_line", |s| {
            GeneratorChoice::LogLine(LogLineGenerator::new(s.seed, s.payload))
        });
        registry.register_generator("message", |s| {
            GeneratorChoice::Message(MessageGenerator::new(s.seed, s.payload))
        });

        registry.register_backend("event_store", |s| {
            BackendChoice::EventStore(
                EventStoreBackend::new(s.root.join("event_store"))
                    .with_flush_every(s.flush_every)
                    .with_sync_on_close(s.sync_on_close),
            )
        });
        registry.register_backend("memory", |_| BackendChoice::Memory(MemoryBackend::new()));
        registry.register_backend("sqlite", |s| {
            BackendChoice::Sqlite(SqliteBackend::new(s.root.join("sqlite")))
        });
        registry.register_backend("file_log", |s| {
            BackendChoice::FileLog(FileLogBackend::new(s.root.join("file_log")))
        });

        registry
    }

    pub fn register_generator(&mut self, key: &'static str, ctor: GeneratorCtor) {
        self.generators.insert(key, ctor);
    }

    pub fn register_backend(&mut self, key: &'static str, ctor: BackendCtor) {
        self.backends.insert(key, ctor);
    }

    pub fn generator_keys(&self) -> Vec<&'static str> {
        self.generators.keys().copied().collect()
    }

    pub fn backend_keys(&self) -> Vec<&'static str> {
        self.backends.keys().copied().collect()
    }

    pub fn generator(&self, key: &str, settings: &GeneratorSettings) -> BenchResult<GeneratorChoice> {
        let ctor = self.generators.get(key).ok_or_else(|| {
            BenchError::Config(format!(
                "unknown generator '{}' (known: {})",
                key,
                self.generator_keys().join(", ")
            ))
        })?;
        Ok(ctor(settings))
    }

    pub fn backend(&self, key: &str, settings: &BackendSettings) -> BenchResult<BackendChoice> {
        let ctor = self.backends.get(key).ok_or_else(|| {
            BenchError::Config(format!(
                "unknown backend '{}' (known: {})",
                key,
                self.backend_keys().join(", ")
            ))
        })?;
        Ok(ctor(settings))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
