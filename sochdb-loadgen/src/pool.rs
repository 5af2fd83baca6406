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

//! # Bounded Worker Pool
//!
//! Fixed set of named OS threads fed through a bounded queue. Runs submit
//! their reader and writer tasks here; the pool outlives individual runs so
//! consecutive runs reuse warm threads.
//!
//! Worker tasks block on storage I/O, so the pool is sized from the core
//! count and not from any async runtime. A task that panics is caught and
//! counted; the thread keeps serving the queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::PoolError;

/// Configuration for a [`WorkerPool`]
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Maximum queued tasks before `submit` blocks
    pub queue_depth: usize,
    /// Stack size per thread
    pub stack_size: usize,
    /// Thread name prefix
    pub name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let cores = num_cpus::get();
        Self {
            num_threads: (cores * 2).clamp(4, 64),
            queue_depth: 1024,
            stack_size: 2 * 1024 * 1024,
            name_prefix: "loadgen-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    /// Default config with an explicit thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
            ..Self::default()
        }
    }
}

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Pool metrics for observability
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Total tasks submitted
    pub tasks_submitted: AtomicU64,
    /// Tasks that ran to completion
    pub tasks_completed: AtomicU64,
    /// Tasks that panicked
    pub tasks_panicked: AtomicU64,
    /// Total execution time (microseconds)
    pub total_exec_time_us: AtomicU64,
    /// Maximum execution time seen (microseconds)
    pub max_exec_time_us: AtomicU64,
}

impl PoolMetrics {
    fn record_execution(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.total_exec_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_exec_time_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Average execution time of finished tasks (microseconds)
    pub fn avg_exec_time_us(&self) -> u64 {
        let finished = self.tasks_completed.load(Ordering::Relaxed)
            + self.tasks_panicked.load(Ordering::Relaxed);
        if finished == 0 {
            return 0;
        }
        self.total_exec_time_us.load(Ordering::Relaxed) / finished
    }

    /// Point-in-time copy for reporting.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            avg_exec_time_us: self.avg_exec_time_us(),
            max_exec_time_us: self.max_exec_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`PoolMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_panicked: u64,
    pub avg_exec_time_us: u64,
    pub max_exec_time_us: u64,
}

/// A bounded pool of blocking worker threads
pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<PoolMetrics>,
}

impl WorkerPool {
    /// Spawn the worker threads.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        let (sender, receiver) = bounded::<Task>(config.queue_depth);
        let metrics = Arc::new(PoolMetrics::default());
        let mut workers = Vec::with_capacity(config.num_threads);

        for i in 0..config.num_threads {
            let receiver = receiver.clone();
            let metrics = metrics.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.name_prefix, i))
                .stack_size(config.stack_size)
                .spawn(move || Self::worker_loop(receiver, metrics))
                .map_err(|e| PoolError::Spawn(e.to_string()))?;
            workers.push(handle);
        }

        tracing::debug!(
            threads = config.num_threads,
            queue_depth = config.queue_depth,
            prefix = %config.name_prefix,
            "Worker pool started"
        );

        Ok(Self {
            config,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            metrics,
        })
    }

    /// Runs until the queue is disconnected and drained.
    fn worker_loop(receiver: Receiver<Task>, metrics: Arc<PoolMetrics>) {
        while let Ok(task) = receiver.recv() {
            let start = Instant::now();

            let outcome = panic::catch_unwind(AssertUnwindSafe(task));

            metrics.record_execution(start.elapsed());
            match outcome {
                Ok(()) => {
                    metrics.tasks_completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    metrics.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        thread = thread::current().name().unwrap_or("?"),
                        "Worker task panicked"
                    );
                }
            }
        }
    }

    /// Queue a task, blocking while the queue is full.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        // Clone the sender so a full queue never blocks `shutdown`.
        let sender = self.sender.lock().clone().ok_or(PoolError::Shutdown)?;
        sender
            .send(Box::new(task))
            .map_err(|_| PoolError::Shutdown)?;
        self.metrics.tasks_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stop accepting tasks. Already queued tasks still run.
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!(prefix = %self.config.name_prefix, "Worker pool shutting down");
        }
    }

    /// Shut down and wait for every thread to exit.
    pub fn join(&self) {
        self.shutdown();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}
