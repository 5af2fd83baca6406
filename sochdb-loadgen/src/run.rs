// SPDX-License-Identifier: AGPL-3.0-or-later
// SochDB - LLM-Optimized Embedded Database
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Run Orchestrator
//!
//! One run = one configuration executed once against fresh backend handles.
//!
//! ```text
//! New ──start()──▶ Starting ──▶ Running ──await_terminated()──▶ Stopping ──▶ Terminated
//!  │                  │                                            │
//!  └──────────────────┴──────────────────▶ Failed ◀────────────────┘
//! ```
//!
//! ## Setup
//!
//! 1. One handle per writer, each writer registered and holding a permit.
//! 2. Each reader attached to a uniformly random writer handle, registered
//!    and holding a permit.
//! 3. Every task submitted to the shared [`WorkerPool`], writers first.
//!
//! No task is submitted before every handle exists and every worker is
//! registered.
//!
//! ## Completion barrier
//!
//! The [`PermitPool`] holds `writers + readers` permits. Each task returns its
//! permit after reporting, so re-acquiring all of them means every task is
//! done. Completion records are drained afterwards, handles are closed, and
//! the run ends in `Terminated` or in `Failed` with the first error seen.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, BackendHandle};
use crate::error::{RunError, RunResult};
use crate::generator::Generator;
use crate::params::RunParams;
use crate::permits::{PermitGuard, PermitPool};
use crate::pool::WorkerPool;
use crate::stats::{OpKind, RunStats, StatsAggregator};
use crate::worker::{self, Completion, WorkerContext, WriterProgress};

/// Identifier assigned by whoever creates the run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a [`Run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    New,
    Starting,
    Running,
    Stopping,
    Terminated,
    /// Absorbing; the run carries its first error.
    Failed,
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::New => "new",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
            RunState::Terminated => "terminated",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Terminated | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One registered worker: its kind, its index among workers of that kind and
/// the position of the handle it operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub kind: OpKind,
    pub index: usize,
    pub handle: usize,
}

/// Interrupts the completion barrier of a run from another thread.
///
/// An interrupted run ends in `Failed` with [`RunError::Interrupted`].
#[derive(Debug, Clone)]
pub struct RunInterrupter {
    permits: Arc<PermitPool>,
}

impl RunInterrupter {
    pub fn interrupt(&self) {
        self.permits.interrupt();
    }
}

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A single execution of one configuration against one backend.
pub struct Run<B, G>
where
    G: Generator,
    B: Backend<G::Item>,
{
    id: RunId,
    params: RunParams,
    backend: B,
    generator: G,
    pool: Arc<WorkerPool>,
    rng: ChaCha8Rng,

    state: RunState,
    failure: Option<RunError>,
    permits: Arc<PermitPool>,
    aggregator: StatsAggregator,
    handles: Vec<Arc<B::Handle>>,
    progress: Vec<WriterProgress>,
    assignments: Vec<WorkerAssignment>,
    completions: Option<Receiver<Completion>>,
    result: Option<RunStats>,
}

impl<B, G> Run<B, G>
where
    G: Generator,
    B: Backend<G::Item>,
{
    /// Validate the configuration against the backend's capabilities.
    ///
    /// Readers against a backend that cannot iterate are rejected here,
    /// before any handle or thread is touched.
    pub fn new(
        id: RunId,
        params: RunParams,
        backend: B,
        generator: G,
        pool: Arc<WorkerPool>,
    ) -> RunResult<Self> {
        if params.reader_count() > 0 && !backend.supports_iteration() {
            return Err(RunError::UnsupportedOperation {
                backend: backend.name().to_string(),
                operation: "iteration",
            });
        }

        Ok(Self {
            id,
            params,
            backend,
            generator,
            pool,
            rng: ChaCha8Rng::from_entropy(),
            state: RunState::New,
            failure: None,
            permits: Arc::new(PermitPool::new(params.worker_count())),
            aggregator: StatsAggregator::new(),
            handles: Vec::with_capacity(params.writer_count()),
            progress: Vec::with_capacity(params.writer_count()),
            assignments: Vec::with_capacity(params.worker_count()),
            completions: None,
            result: None,
        })
    }

    /// Make the reader-to-handle assignment reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The error that moved the run to `Failed`.
    pub fn failure(&self) -> Option<&RunError> {
        self.failure.as_ref()
    }

    /// Registered workers in registration order: all writers, then readers.
    pub fn assignments(&self) -> &[WorkerAssignment] {
        &self.assignments
    }

    pub fn interrupter(&self) -> RunInterrupter {
        RunInterrupter {
            permits: self.permits.clone(),
        }
    }

    fn transition(&mut self, to: RunState) {
        tracing::debug!(run = %self.id, from = %self.state, to = %to, "Run state change");
        self.state = to;
    }

    fn fail(&mut self, error: RunError) -> RunError {
        tracing::error!(run = %self.id, state = %self.state, error = %error, "Run failed");
        self.transition(RunState::Failed);
        self.failure = Some(error.clone());
        error
    }

    /// Create handles, register workers and submit their tasks.
    ///
    /// Returns once every task is queued; use [`Run::await_terminated`] to
    /// wait for completion.
    pub fn start(&mut self) -> RunResult<()> {
        if self.state != RunState::New {
            return Err(RunError::IllegalState {
                state: self.state,
                action: "start",
            });
        }
        self.transition(RunState::Starting);

        let (sender, receiver) = unbounded();
        self.completions = Some(receiver);

        // Unsubmitted tasks own their permit; dropping them on any failure
        // below gives it back.
        let mut tasks: Vec<Task> = Vec::with_capacity(self.params.worker_count());
        let registered = self
            .register_writers(&sender, &mut tasks)
            .and_then(|()| self.register_readers(&sender, &mut tasks));
        drop(sender);
        if let Err(e) = registered {
            drop(tasks);
            let _ = self.close_handles();
            return Err(self.fail(e));
        }

        let total = tasks.len();
        let mut pending = tasks.into_iter();
        let mut submitted = 0usize;
        while let Some(task) = pending.next() {
            if let Err(e) = self.pool.submit(task) {
                tracing::error!(
                    run = %self.id,
                    submitted,
                    total,
                    error = %e,
                    "Task submission failed"
                );
                drop(pending);
                // Submitted tasks still run; wait for them before closing.
                if let Err(wait_error) = self.permits.acquire(self.params.worker_count()) {
                    tracing::warn!(
                        run = %self.id,
                        error = %wait_error,
                        "Stopped waiting for submitted tasks"
                    );
                }
                if let Some(close_error) = self.close_handles() {
                    tracing::warn!(
                        run = %self.id,
                        error = %close_error,
                        "Handle cleanup after failed submission reported an error"
                    );
                }
                return Err(self.fail(e.into()));
            }
            submitted += 1;
        }

        tracing::info!(
            run = %self.id,
            backend = self.backend.name(),
            writers = self.params.writer_count(),
            readers = self.params.reader_count(),
            "Run started"
        );
        self.transition(RunState::Running);
        Ok(())
    }

    fn register_writers(
        &mut self,
        sender: &Sender<Completion>,
        tasks: &mut Vec<Task>,
    ) -> RunResult<()> {
        let codec = self.generator.codec();
        let amount = self.params.writes_per_writer();
        let pregenerate = self.params.pregenerate_items();

        for index in 0..self.params.writer_count() {
            let handle = Arc::new(self.backend.create(codec)?);
            let progress = WriterProgress::new();
            self.handles.push(handle.clone());
            self.progress.push(progress.clone());
            self.assignments.push(WorkerAssignment {
                kind: OpKind::Write,
                index,
                handle: index,
            });
            tracing::debug!(run = %self.id, writer = index, "Backend handle created");

            self.permits.acquire(1)?;
            let ctx = WorkerContext::new(
                OpKind::Write,
                index,
                sender.clone(),
                PermitGuard::adopt(self.permits.clone()),
            );
            let done = progress.finish_on_drop();
            let mut generator = self.generator.split();
            tasks.push(Box::new(move || {
                let _done = done;
                let outcome = worker::write_items(&mut generator, &*handle, amount, pregenerate);
                ctx.finish(outcome);
            }));
        }
        Ok(())
    }

    fn register_readers(
        &mut self,
        sender: &Sender<Completion>,
        tasks: &mut Vec<Task>,
    ) -> RunResult<()> {
        let amount = self.params.reads_per_reader();

        for index in 0..self.params.reader_count() {
            let slot = self.rng.gen_range(0..self.handles.len());
            let handle = self.handles[slot].clone();
            let progress = self.progress[slot].clone();
            self.assignments.push(WorkerAssignment {
                kind: OpKind::Read,
                index,
                handle: slot,
            });
            tracing::debug!(run = %self.id, reader = index, handle = slot, "Reader attached");

            self.permits.acquire(1)?;
            let ctx = WorkerContext::new(
                OpKind::Read,
                index,
                sender.clone(),
                PermitGuard::adopt(self.permits.clone()),
            );
            tasks.push(Box::new(move || {
                let outcome = worker::read_items::<G::Item, _>(&*handle, &progress, amount);
                ctx.finish(outcome);
            }));
        }
        Ok(())
    }

    /// Block until every task finished, then close all handles.
    ///
    /// Ends in `Terminated` when every worker reported success and every
    /// handle closed cleanly, otherwise in `Failed` with the first error.
    pub fn await_terminated(&mut self) -> RunResult<()> {
        match self.state {
            RunState::Running => {}
            RunState::Terminated => return Ok(()),
            RunState::Failed => {
                return Err(self.failure.clone().unwrap_or(RunError::IllegalState {
                    state: RunState::Failed,
                    action: "await",
                }))
            }
            state => {
                return Err(RunError::IllegalState {
                    state,
                    action: "await",
                })
            }
        }
        self.transition(RunState::Stopping);

        let mut first_error = match self.permits.acquire(self.params.worker_count()) {
            Ok(()) => self.drain_completions(),
            Err(e) => Some(e),
        };
        if let Some(close_error) = self.close_handles() {
            first_error.get_or_insert(close_error);
        }

        if let Some(error) = first_error {
            return Err(self.fail(error));
        }

        self.result = Some(self.aggregator.snapshot(
            self.id,
            self.backend.name(),
            self.generator.generated_type(),
            self.params.writer_count(),
            self.params.reader_count(),
        ));
        tracing::info!(
            run = %self.id,
            written = self.aggregator.total_amount(OpKind::Write) as u64,
            read = self.aggregator.total_amount(OpKind::Read) as u64,
            "Run terminated"
        );
        self.transition(RunState::Terminated);
        Ok(())
    }

    /// Move completion records into the aggregator. Returns the first
    /// failure, or a missing record for a worker that never reported.
    fn drain_completions(&mut self) -> Option<RunError> {
        let receiver = self.completions.take()?;
        let writers = self.params.writer_count();
        let mut reported = vec![false; self.params.worker_count()];
        let mut first_error = None;

        for record in receiver.try_iter() {
            let slot = match record.kind {
                OpKind::Write => record.index,
                OpKind::Read => writers + record.index,
            };
            if let Some(seen) = reported.get_mut(slot) {
                *seen = true;
            }
            match record.outcome {
                Ok(m) => self.aggregator.add(record.kind, m.amount, m.elapsed),
                Err(e) => {
                    first_error.get_or_insert(RunError::Backend(e));
                }
            }
        }

        if first_error.is_none() {
            first_error = self
                .assignments
                .iter()
                .zip(&reported)
                .find(|(_, seen)| !**seen)
                .map(|(a, _)| RunError::WorkerPanicked {
                    kind: a.kind,
                    index: a.index,
                });
        }
        first_error
    }

    /// Close every handle once. Returns the first close error.
    fn close_handles(&mut self) -> Option<RunError> {
        let mut first_error = None;
        for (index, handle) in self.handles.drain(..).enumerate() {
            if let Err(e) = handle.close() {
                tracing::warn!(run = %self.id, handle = index, error = %e, "Handle close failed");
                first_error.get_or_insert(RunError::Backend(e));
            }
        }
        first_error
    }

    /// No-op: runs terminate on their own once every worker is done.
    pub fn stop(&mut self) {}

    /// Final statistics; only available once the run terminated.
    pub fn stats(&self) -> RunResult<RunStats> {
        match (&self.result, self.state) {
            (Some(stats), RunState::Terminated) => Ok(stats.clone()),
            (_, state) => Err(RunError::NotReady(state)),
        }
    }

    /// `start`, wait for termination and return the statistics.
    pub fn execute(&mut self) -> RunResult<RunStats> {
        self.start()?;
        self.await_terminated()?;
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ItemIter;
    use crate::error::{BackendError, CodecError};
    use crate::pool::WorkerPoolConfig;
    use parking_lot::Mutex;

    struct Bytes(u8);

    impl Generator for Bytes {
        type Item = u8;

        fn next_item(&mut self) -> u8 {
            self.0 = self.0.wrapping_add(1);
            self.0
        }

        fn split(&mut self) -> Self {
            Bytes(self.next_item())
        }

        fn serialize(item: &u8) -> Vec<u8> {
            vec![*item]
        }

        fn deserialize(bytes: &[u8]) -> Result<u8, CodecError> {
            bytes.first().copied().ok_or(CodecError::Malformed {
                type_name: "u8",
                reason: "empty".into(),
            })
        }
    }

    struct Mem;

    #[derive(Default)]
    struct MemHandle(Mutex<Vec<u8>>);

    impl BackendHandle<u8> for MemHandle {
        fn append(&self, item: &u8) -> Result<(), BackendError> {
            self.0.lock().push(*item);
            Ok(())
        }

        fn iterate_all(&self) -> Result<ItemIter<'_, u8>, BackendError> {
            let items = self.0.lock().clone();
            Ok(Box::new(items.into_iter().map(Ok)))
        }

        fn close(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    impl Backend<u8> for Mem {
        type Handle = MemHandle;

        fn name(&self) -> &str {
            "mem"
        }

        fn supports_iteration(&self) -> bool {
            true
        }

        fn create(&self, _codec: crate::generator::Codec<u8>) -> Result<MemHandle, BackendError> {
            Ok(MemHandle::default())
        }
    }

    fn pool() -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(WorkerPoolConfig::with_threads(4)).unwrap())
    }

    fn run(writers: usize, readers: usize) -> Run<Mem, Bytes> {
        let params = RunParams::new(writers, readers, 20, 10).unwrap();
        Run::new(RunId(1), params, Mem, Bytes(0), pool()).unwrap().with_seed(42)
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RunState::Stopping.to_string(), "stopping");
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert_eq!(RunId(12).to_string(), "12");
    }

    #[test]
    fn test_stats_not_ready_before_start() {
        let run = run(1, 0);
        assert_eq!(run.state(), RunState::New);
        assert_eq!(run.stats(), Err(RunError::NotReady(RunState::New)));
    }

    #[test]
    fn test_start_twice_is_illegal() {
        let mut run = run(1, 1);
        run.start().unwrap();
        assert_eq!(
            run.start(),
            Err(RunError::IllegalState {
                state: RunState::Running,
                action: "start",
            })
        );
        run.await_terminated().unwrap();
    }

    #[test]
    fn test_await_before_start_is_illegal() {
        let mut run = run(1, 0);
        assert!(matches!(
            run.await_terminated(),
            Err(RunError::IllegalState { state: RunState::New, .. })
        ));
    }

    #[test]
    fn test_execute_reaches_terminated() {
        let mut run = run(2, 3);
        let stats = run.execute().unwrap();
        assert_eq!(run.state(), RunState::Terminated);
        assert_eq!(stats.total_amount(OpKind::Write), 40);
        assert_eq!(stats.total_amount(OpKind::Read), 30);
        assert_eq!(stats.measurements(OpKind::Read).len(), 3);
        assert_eq!(stats.item_type(), "u8");
        assert_eq!(stats.backend(), "mem");

        // Waiting again is a no-op.
        run.await_terminated().unwrap();
        assert_eq!(run.stats().unwrap(), stats);
    }

    #[test]
    fn test_readers_attach_to_existing_handles() {
        let mut run = run(3, 5);
        run.start().unwrap();
        let readers: Vec<_> = run
            .assignments()
            .iter()
            .filter(|a| a.kind == OpKind::Read)
            .collect();
        assert_eq!(readers.len(), 5);
        assert!(readers.iter().all(|a| a.handle < 3));
        run.await_terminated().unwrap();
    }

    #[test]
    fn test_stop_is_noop() {
        let mut run = run(1, 0);
        run.stop();
        assert_eq!(run.state(), RunState::New);
    }
}
