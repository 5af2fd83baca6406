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

//! # SochDB Load Generation Core
//!
//! Drives concurrent readers and writers against pluggable persistence
//! backends and aggregates what they measured.
//!
//! ## Pieces
//!
//! - [`run::Run`]: lifecycle `New → Starting → Running → Stopping → Terminated`
//!   (or `Failed`), one backend handle per writer, readers attached to a
//!   randomly chosen writer handle.
//! - [`permits::PermitPool`]: counting permits that bound task creation and
//!   double as the completion barrier.
//! - [`pool::WorkerPool`]: bounded thread pool shared by consecutive runs.
//! - [`stats`]: per-kind measurement sequences and the derived latency and
//!   throughput figures.
//! - [`backend`] and [`generator`]: the capability traits implemented by
//!   stores, loggers and item generators.
//!
//! ## Usage
//!
//! ```ignore
//! let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::default())?);
//! let params = RunParams::builder().writers(4).readers(2).writes_per_writer(10_000).build()?;
//! let mut run = Run::new(RunId(1), params, backend, generator, pool)?;
//! let stats = run.execute()?;
//! println!("{}", stats);
//! ```

pub mod backend;
pub mod error;
pub mod generator;
pub mod params;
pub mod permits;
pub mod pool;
pub mod run;
pub mod stats;
pub mod worker;

pub use backend::{Backend, BackendHandle, ItemIter};
pub use error::{BackendError, CodecError, PoolError, RunError, RunResult};
pub use generator::{Codec, Generator};
pub use params::{RunParams, RunParamsBuilder};
pub use permits::PermitPool;
pub use pool::{PoolSnapshot, WorkerPool, WorkerPoolConfig};
pub use run::{Run, RunId, RunInterrupter, RunState, WorkerAssignment};
pub use stats::{Measurement, MovingAverage, OpKind, RunStats, RunSummary, StatsAggregator, TimeUnit};
