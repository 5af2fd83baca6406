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

//! Validated, immutable parameters of a single run.

use serde::Serialize;

use crate::error::{RunError, RunResult};

/// Worker counts and per-worker amounts for one run.
///
/// Only constructible through [`RunParams::new`] or the builder, both of
/// which validate:
/// - at least one reader or writer
/// - writers persist at least one item each
/// - readers need at least one writer handle to read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunParams {
    writer_count: usize,
    reader_count: usize,
    writes_per_writer: u64,
    reads_per_reader: u64,
    pregenerate_items: bool,
}

impl RunParams {
    pub fn new(
        writer_count: usize,
        reader_count: usize,
        writes_per_writer: u64,
        reads_per_reader: u64,
    ) -> RunResult<Self> {
        Self::builder()
            .writers(writer_count)
            .readers(reader_count)
            .writes_per_writer(writes_per_writer)
            .reads_per_reader(reads_per_reader)
            .build()
    }

    pub fn builder() -> RunParamsBuilder {
        RunParamsBuilder::default()
    }

    pub fn writer_count(&self) -> usize {
        self.writer_count
    }

    pub fn reader_count(&self) -> usize {
        self.reader_count
    }

    /// Total number of workers, which is also the permit pool size.
    pub fn worker_count(&self) -> usize {
        self.writer_count + self.reader_count
    }

    pub fn writes_per_writer(&self) -> u64 {
        self.writes_per_writer
    }

    pub fn reads_per_reader(&self) -> u64 {
        self.reads_per_reader
    }

    /// Whether writers draw all their items before starting the timer.
    pub fn pregenerate_items(&self) -> bool {
        self.pregenerate_items
    }

    fn validate(self) -> RunResult<Self> {
        if self.writer_count == 0 && self.reader_count == 0 {
            return Err(RunError::InvalidConfiguration(
                "a run needs at least one reader or writer".into(),
            ));
        }
        if self.writer_count > 0 && self.writes_per_writer == 0 {
            return Err(RunError::InvalidConfiguration(
                "each writer must persist at least one item".into(),
            ));
        }
        if self.reader_count > 0 && self.writer_count == 0 {
            return Err(RunError::InvalidConfiguration(format!(
                "{} readers configured but no writer handle to read from",
                self.reader_count
            )));
        }
        Ok(self)
    }
}

/// Builder for [`RunParams`].
#[derive(Debug, Clone, Default)]
pub struct RunParamsBuilder {
    writer_count: usize,
    reader_count: usize,
    writes_per_writer: u64,
    reads_per_reader: u64,
    pregenerate_items: bool,
}

impl RunParamsBuilder {
    pub fn writers(mut self, count: usize) -> Self {
        self.writer_count = count;
        self
    }

    pub fn readers(mut self, count: usize) -> Self {
        self.reader_count = count;
        self
    }

    pub fn writes_per_writer(mut self, amount: u64) -> Self {
        self.writes_per_writer = amount;
        self
    }

    pub fn reads_per_reader(mut self, amount: u64) -> Self {
        self.reads_per_reader = amount;
        self
    }

    pub fn pregenerate_items(mut self, enabled: bool) -> Self {
        self.pregenerate_items = enabled;
        self
    }

    pub fn build(self) -> RunResult<RunParams> {
        RunParams {
            writer_count: self.writer_count,
            reader_count: self.reader_count,
            writes_per_writer: self.writes_per_writer,
            reads_per_reader: self.reads_per_reader,
            pregenerate_items: self.pregenerate_items,
        }
        .validate()
    }
}
