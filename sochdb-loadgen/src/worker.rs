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

//! Writer and reader work loops, and the completion protocol around them.
//!
//! A task reports exactly one [`Completion`] and then gives its permit back.
//! Both live in [`WorkerContext`]: `finish` sends the record, and the permit
//! is released when the context drops right after. A task that panics never
//! sends, but unwinding still drops the context and releases the permit.

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;

use crate::backend::BackendHandle;
use crate::error::BackendError;
use crate::generator::Generator;
use crate::permits::PermitGuard;
use crate::stats::{Measurement, OpKind};

/// What one worker reports when it finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub kind: OpKind,
    pub index: usize,
    pub outcome: Result<Measurement, BackendError>,
}

/// Completion channel plus the permit a task holds while it runs.
#[derive(Debug)]
pub struct WorkerContext {
    kind: OpKind,
    index: usize,
    completions: Sender<Completion>,
    _permit: PermitGuard,
}

impl WorkerContext {
    pub fn new(
        kind: OpKind,
        index: usize,
        completions: Sender<Completion>,
        permit: PermitGuard,
    ) -> Self {
        Self {
            kind,
            index,
            completions,
            _permit: permit,
        }
    }

    /// Report the outcome, then release the permit.
    pub fn finish(self, outcome: Result<Measurement, BackendError>) {
        match &outcome {
            Ok(m) => tracing::debug!(
                kind = %self.kind,
                index = self.index,
                amount = m.amount,
                elapsed_us = m.elapsed.as_micros() as u64,
                "Worker finished"
            ),
            Err(e) => tracing::warn!(
                kind = %self.kind,
                index = self.index,
                error = %e,
                "Worker failed"
            ),
        }
        // The orchestrator drains the channel only after the barrier, so the
        // receiver is alive here unless the run itself was dropped.
        let _ = self.completions.send(Completion {
            kind: self.kind,
            index: self.index,
            outcome,
        });
    }
}

/// Whether the writer feeding a handle is done.
///
/// Readers use it to tell "nothing written yet" from "nothing will ever be
/// written": an empty iteration after the writer finished cannot make
/// progress.
#[derive(Debug, Clone, Default)]
pub struct WriterProgress(Arc<AtomicBool>);

impl WriterProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Guard that marks the writer finished when dropped.
    pub fn finish_on_drop(&self) -> FinishGuard {
        FinishGuard(self.0.clone())
    }
}

#[derive(Debug)]
pub struct FinishGuard(Arc<AtomicBool>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Append `amount` generated items to `handle`.
///
/// The timer brackets the appends. With `pregenerate` all items are drawn
/// before the timer starts; otherwise generation is interleaved with the
/// appends and counted in the measurement.
pub fn write_items<G, H>(
    generator: &mut G,
    handle: &H,
    amount: u64,
    pregenerate: bool,
) -> Result<Measurement, BackendError>
where
    G: Generator,
    H: BackendHandle<G::Item> + ?Sized,
{
    if pregenerate {
        let items: Vec<G::Item> = (0..amount).map(|_| generator.next_item()).collect();
        let start = Instant::now();
        for item in &items {
            handle.append(item).map_err(BackendError::into_write_failure)?;
        }
        return Ok(Measurement::new(amount, start.elapsed()));
    }

    let start = Instant::now();
    for _ in 0..amount {
        let item = generator.next_item();
        handle.append(&item).map_err(BackendError::into_write_failure)?;
    }
    Ok(Measurement::new(amount, start.elapsed()))
}

/// Read `amount` items from `handle`, re-opening the iteration until the
/// quota is met.
///
/// Every iteration is dropped before the next one opens. An empty iteration
/// yields the thread; an empty iteration after the writer finished fails,
/// since the quota can no longer be reached.
pub fn read_items<T, H>(
    handle: &H,
    writer: &WriterProgress,
    amount: u64,
) -> Result<Measurement, BackendError>
where
    H: BackendHandle<T> + ?Sized,
{
    let start = Instant::now();
    let mut read = 0u64;

    while read < amount {
        let writer_was_finished = writer.is_finished();
        let mut progressed = false;
        {
            let items = handle
                .iterate_all()
                .map_err(BackendError::into_read_failure)?;
            for item in items {
                let _ = black_box(item.map_err(BackendError::into_read_failure)?);
                read += 1;
                progressed = true;
                if read >= amount {
                    break;
                }
            }
        }

        if !progressed {
            if writer_was_finished {
                return Err(BackendError::ReadFailed(format!(
                    "store is empty and its writer finished ({read} of {amount} items read)"
                )));
            }
            thread::yield_now();
        }
    }

    Ok(Measurement::new(read, start.elapsed()))
}
