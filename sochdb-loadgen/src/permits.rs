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

//! # Counting Permit Pool
//!
//! A semaphore sized to the number of workers of a run. The orchestrator
//! takes one permit per task it creates; each task gives its permit back when
//! it finishes. Acquiring all `N` permits afterwards therefore means "all
//! tasks are done", so the same primitive bounds task creation and serves as
//! the completion barrier.
//!
//! Waiters can be interrupted, which makes every pending and future
//! acquisition fail.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{RunError, RunResult};

#[derive(Debug)]
struct PermitState {
    available: usize,
    interrupted: bool,
}

/// Counting semaphore with interruptible, all-or-nothing `acquire(n)`.
#[derive(Debug)]
pub struct PermitPool {
    capacity: usize,
    state: Mutex<PermitState>,
    cond: Condvar,
}

impl PermitPool {
    /// Create a pool with all `capacity` permits available.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PermitState {
                available: capacity,
                interrupted: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.state.lock().available
    }

    /// Block until `n` permits are available at once, then take them.
    ///
    /// Fails with [`RunError::Interrupted`] if the pool is interrupted before
    /// or while waiting.
    pub fn acquire(&self, n: usize) -> RunResult<()> {
        let mut state = self.state.lock();
        loop {
            if state.interrupted {
                return Err(RunError::Interrupted);
            }
            if state.available >= n {
                state.available -= n;
                return Ok(());
            }
            self.cond.wait(&mut state);
        }
    }

    /// Return `n` permits and wake waiters.
    pub fn release(&self, n: usize) {
        let mut state = self.state.lock();
        state.available += n;
        debug_assert!(
            state.available <= self.capacity,
            "released more permits than the pool holds"
        );
        self.cond.notify_all();
    }

    /// Fail all current and future acquisitions.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupted = true;
        self.cond.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.lock().interrupted
    }
}

/// Gives one permit back when dropped.
///
/// Held by every worker task so the permit returns exactly once, on success,
/// on error and on panic alike.
#[derive(Debug)]
pub struct PermitGuard {
    pool: Arc<PermitPool>,
}

impl PermitGuard {
    /// Wrap a permit that was already acquired from `pool`.
    pub fn adopt(pool: Arc<PermitPool>) -> Self {
        Self { pool }
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        self.pool.release(1);
    }
}
