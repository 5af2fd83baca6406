//! Evaluation driver: sweeps writer/reader counts over every selected backend.
//!
//! The generator and all backends are resolved from the [`Registry`] before
//! the first run, so a typo in a key fails fast. Every run shares one
//! [`WorkerPool`]; run ids increase monotonically across the whole sweep.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sochdb_loadgen::{Backend, Generator, Run, RunId, RunParams, RunStats, WorkerPool};

use crate::config::EvalConfig;
use crate::registry::{BackendChoice, BackendSettings, GeneratorChoice, GeneratorSettings, Registry};
use crate::{BenchResult, RunRecord};

pub struct Evaluation<'a> {
    config: &'a EvalConfig,
    registry: &'a Registry,
    pool: Arc<WorkerPool>,
    data_root: PathBuf,
    next_run_id: u64,
}

impl<'a> Evaluation<'a> {
    pub fn new(
        config: &'a EvalConfig,
        registry: &'a Registry,
        pool: Arc<WorkerPool>,
        data_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            registry,
            pool,
            data_root: data_root.into(),
            next_run_id: 1,
        }
    }

    /// Execute the full sweep. Failed runs become failure records; only
    /// resolution errors abort the evaluation.
    pub fn run(&mut self) -> BenchResult<Vec<RunRecord>> {
        let generator = self.registry.generator(
            &self.config.generator,
            &GeneratorSettings {
                seed: self.config.seed,
                payload: self.config.payload(),
            },
        )?;

        let settings = BackendSettings {
            root: self.data_root.clone(),
            flush_every: self.config.flush_every,
            sync_on_close: self.config.sync_on_close,
        };
        let backends = self
            .config
            .backends
            .iter()
            .map(|key| self.registry.backend(key, &settings))
            .collect::<BenchResult<Vec<_>>>()?;

        let mut records = Vec::new();
        match generator {
            GeneratorChoice::String(g) => self.sweep_backends(g, &backends, &mut records),
            GeneratorChoice::BigInt(g) => self.sweep_backends(g, &backends, &mut records),
            GeneratorChoice::NodeUrn(g) => self.sweep_backends(g, &backends, &mut records),
            GeneratorChoice::LogLine(g) => self.sweep_backends(g, &backends, &mut records),
            GeneratorChoice::Message(g) => self.sweep_backends(g, &backends, &mut records),
        }
        Ok(records)
    }

    fn sweep_backends<G: Generator>(
        &mut self,
        mut generator: G,
        backends: &[BackendChoice],
        records: &mut Vec<RunRecord>,
    ) {
        for backend in backends {
            match backend {
                BackendChoice::EventStore(b) => self.sweep(&mut generator, b, records),
                BackendChoice::Memory(b) => self.sweep(&mut generator, b, records),
                BackendChoice::Sqlite(b) => self.sweep(&mut generator, b, records),
                BackendChoice::FileLog(b) => self.sweep(&mut generator, b, records),
            }
        }
    }

    fn sweep<G, B>(&mut self, generator: &mut G, backend: &B, records: &mut Vec<RunRecord>)
    where
        G: Generator,
        B: Backend<G::Item> + Clone,
    {
        let max_readers = if backend.supports_iteration() {
            self.config.readers
        } else {
            if self.config.readers > 0 {
                tracing::warn!(
                    backend = backend.name(),
                    "Backend cannot iterate; sweeping writers only"
                );
            }
            0
        };

        if self.config.warm_up {
            let run_id = self.allocate_run_id();
            let warm_up = RunParams::builder()
                .writers(1)
                .readers(max_readers)
                .writes_per_writer(self.config.warm_up_amount.max(1))
                .reads_per_reader(self.config.warm_up_amount)
                .pregenerate_items(self.config.pregenerate)
                .build();
            match warm_up.and_then(|params| self.execute(run_id, generator, backend, params)) {
                Ok(_) => tracing::info!(backend = backend.name(), "Warm-up finished"),
                Err(e) => tracing::warn!(backend = backend.name(), error = %e, "Warm-up failed"),
            }
            self.settle();
        }

        for writers in 1..=self.config.writers {
            for readers in 0..=max_readers {
                for repetition in 1..=self.config.runs {
                    let run_id = self.allocate_run_id();
                    tracing::info!(
                        run = run_id,
                        backend = backend.name(),
                        writers,
                        readers,
                        repetition,
                        "Starting run"
                    );

                    let outcome = RunParams::builder()
                        .writers(writers)
                        .readers(readers)
                        .writes_per_writer(self.config.writes_per_thread)
                        .reads_per_reader(self.config.reads_per_thread)
                        .pregenerate_items(self.config.pregenerate)
                        .build()
                        .and_then(|params| self.execute(run_id, generator, backend, params));

                    let mut record = RunRecord {
                        run_id,
                        backend: backend.name().to_string(),
                        generator: generator.generated_type().to_string(),
                        writers,
                        readers,
                        summary: None,
                        error: None,
                    };
                    match outcome {
                        Ok(stats) => {
                            tracing::info!("\n{}", stats);
                            record.summary = Some(stats.summary());
                        }
                        Err(e) => {
                            tracing::error!(run = run_id, error = %e, "Run failed");
                            record.error = Some(e.to_string());
                        }
                    }
                    records.push(record);
                    self.settle();
                }
            }
        }
    }

    /// Build and execute one run; the run and its handles are dropped on return.
    fn execute<G, B>(
        &self,
        id: u64,
        generator: &mut G,
        backend: &B,
        params: RunParams,
    ) -> sochdb_loadgen::RunResult<RunStats>
    where
        G: Generator,
        B: Backend<G::Item> + Clone,
    {
        let mut run = Run::new(
            RunId(id),
            params,
            backend.clone(),
            generator.split(),
            self.pool.clone(),
        )?
        .with_seed(self.config.seed.wrapping_add(id));
        run.execute()
    }

    fn allocate_run_id(&mut self) -> u64 {
        let id = self.next_run_id;
        self.next_run_id += 1;
        id
    }

    fn settle(&self) {
        if self.config.settle_between_runs && self.config.settle_millis > 0 {
            thread::sleep(Duration::from_millis(self.config.settle_millis));
        }
    }
}
