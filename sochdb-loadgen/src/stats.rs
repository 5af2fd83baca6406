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

//! # Run Statistics
//!
//! Workers report one [`Measurement`] each. The aggregator keeps them in two
//! independently locked sequences (reads, writes) and derives:
//!
//! - total duration: sum of elapsed times, i.e. aggregate work, not wall time
//! - total amount: sum of processed items
//! - average duration per op: exact nanosecond division, zero for no items
//! - average ops per time unit: mean of per-measurement rates
//!
//! The throughput figure is the mean of per-worker rates
//! (`amount / elapsed`, one per measurement), not `total_amount /
//! total_duration`. With `(10, 10ms)` and `(20, 5ms)` it reports 2500 ops/s
//! where the aggregate rate would be 2000. Reports depend on this definition.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::run::RunId;

/// Which side of the workload a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Write,
    Read,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Write => "write",
            OpKind::Read => "read",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit in which throughput is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanos,
    Micros,
    Millis,
    Seconds,
    Minutes,
}

impl TimeUnit {
    /// Nanoseconds in one unit.
    pub const fn nanos(self) -> u64 {
        match self {
            TimeUnit::Nanos => 1,
            TimeUnit::Micros => 1_000,
            TimeUnit::Millis => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
        }
    }
}

/// One worker's reported `(amount, elapsed)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub amount: u64,
    pub elapsed: Duration,
}

impl Measurement {
    pub fn new(amount: u64, elapsed: Duration) -> Self {
        Self { amount, elapsed }
    }

    /// Items per nanosecond. Elapsed is clamped to 1ns.
    fn rate_per_nano(&self) -> f64 {
        let nanos = self.elapsed.as_nanos().max(1);
        self.amount as f64 / nanos as f64
    }
}

/// Running mean over the last `period` values.
///
/// Keeps a running sum next to the window so `average` is O(1).
#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    /// A period of zero is treated as one.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }
    }

    /// Mean of the current window; `0.0` when empty.
    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.sum / self.window.len() as f64
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

// Derivations shared by the live aggregator and the frozen snapshot.

fn total_duration(measurements: &[Measurement]) -> Duration {
    measurements
        .iter()
        .fold(Duration::ZERO, |acc, m| acc.saturating_add(m.elapsed))
}

fn total_amount(measurements: &[Measurement]) -> u128 {
    measurements.iter().map(|m| m.amount as u128).sum()
}

fn avg_duration_per_op(measurements: &[Measurement]) -> Duration {
    let amount = total_amount(measurements);
    if amount == 0 {
        return Duration::ZERO;
    }
    let nanos = total_duration(measurements).as_nanos() / amount;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn avg_ops_per(measurements: &[Measurement], unit: TimeUnit) -> f64 {
    let mut avg = MovingAverage::new(measurements.len());
    for m in measurements {
        avg.add(m.rate_per_nano());
    }
    avg.average() * unit.nanos() as f64
}

/// Thread-safe collector of measurements for a run in progress.
///
/// Reads and writes sit behind separate locks and never contend with each
/// other. Derived figures reflect whatever was appended so far; they are
/// only final once the run terminated.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    writes: Mutex<Vec<Measurement>>,
    reads: Mutex<Vec<Measurement>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn sequence(&self, kind: OpKind) -> &Mutex<Vec<Measurement>> {
        match kind {
            OpKind::Write => &self.writes,
            OpKind::Read => &self.reads,
        }
    }

    pub fn add_written(&self, amount: u64, elapsed: Duration) {
        self.add(OpKind::Write, amount, elapsed);
    }

    pub fn add_read(&self, amount: u64, elapsed: Duration) {
        self.add(OpKind::Read, amount, elapsed);
    }

    pub fn add(&self, kind: OpKind, amount: u64, elapsed: Duration) {
        self.sequence(kind)
            .lock()
            .push(Measurement::new(amount, elapsed));
    }

    pub fn measurement_count(&self, kind: OpKind) -> usize {
        self.sequence(kind).lock().len()
    }

    pub fn total_duration(&self, kind: OpKind) -> Duration {
        total_duration(&self.sequence(kind).lock())
    }

    pub fn total_amount(&self, kind: OpKind) -> u128 {
        total_amount(&self.sequence(kind).lock())
    }

    pub fn avg_duration_per_op(&self, kind: OpKind) -> Duration {
        avg_duration_per_op(&self.sequence(kind).lock())
    }

    pub fn avg_ops_per(&self, kind: OpKind, unit: TimeUnit) -> f64 {
        avg_ops_per(&self.sequence(kind).lock(), unit)
    }

    /// Freeze the current sequences into an immutable [`RunStats`].
    pub fn snapshot(
        &self,
        run_id: RunId,
        backend: &str,
        item_type: &'static str,
        writer_count: usize,
        reader_count: usize,
    ) -> RunStats {
        RunStats {
            run_id,
            backend: backend.to_string(),
            item_type,
            writer_count,
            reader_count,
            writes: self.writes.lock().clone(),
            reads: self.reads.lock().clone(),
        }
    }
}

/// Final statistics of a terminated run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    run_id: RunId,
    backend: String,
    item_type: &'static str,
    writer_count: usize,
    reader_count: usize,
    writes: Vec<Measurement>,
    reads: Vec<Measurement>,
}

impl RunStats {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn item_type(&self) -> &'static str {
        self.item_type
    }

    pub fn writer_count(&self) -> usize {
        self.writer_count
    }

    pub fn reader_count(&self) -> usize {
        self.reader_count
    }

    pub fn measurements(&self, kind: OpKind) -> &[Measurement] {
        match kind {
            OpKind::Write => &self.writes,
            OpKind::Read => &self.reads,
        }
    }

    pub fn total_duration(&self, kind: OpKind) -> Duration {
        total_duration(self.measurements(kind))
    }

    pub fn total_amount(&self, kind: OpKind) -> u128 {
        total_amount(self.measurements(kind))
    }

    pub fn avg_duration_per_op(&self, kind: OpKind) -> Duration {
        avg_duration_per_op(self.measurements(kind))
    }

    pub fn avg_ops_per(&self, kind: OpKind, unit: TimeUnit) -> f64 {
        avg_ops_per(self.measurements(kind), unit)
    }

    /// Flat record with the stable reporting field set.
    pub fn summary(&self) -> RunSummary {
        let ms = |d: Duration| d.as_secs_f64() * 1_000.0;
        let ops = |kind| u64::try_from(self.total_amount(kind)).unwrap_or(u64::MAX);
        let per_op_ns = |kind| {
            u64::try_from(self.avg_duration_per_op(kind).as_nanos()).unwrap_or(u64::MAX)
        };

        RunSummary {
            run_id: self.run_id.0,
            backend: self.backend.clone(),
            item_type: self.item_type.to_string(),
            reader_count: self.reader_count,
            writer_count: self.writer_count,
            total_read_duration_ms: ms(self.total_duration(OpKind::Read)),
            total_write_duration_ms: ms(self.total_duration(OpKind::Write)),
            total_reading_ops: ops(OpKind::Read),
            total_writing_ops: ops(OpKind::Write),
            avg_duration_per_reading_op_ns: per_op_ns(OpKind::Read),
            avg_duration_per_writing_op_ns: per_op_ns(OpKind::Write),
            avg_reading_ops_per_s: self.avg_ops_per(OpKind::Read, TimeUnit::Seconds),
            avg_writing_ops_per_s: self.avg_ops_per(OpKind::Write, TimeUnit::Seconds),
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = format!("========== STATS FOR RUN {} ==========", self.run_id);
        writeln!(f, "{}", banner)?;
        writeln!(f, "{:<34}: {}", "Backend", self.backend)?;
        writeln!(f, "{:<34}: {}", "Item type", self.item_type)?;
        writeln!(f, "{:<34}: {}", "Reader threads", self.reader_count)?;
        writeln!(f, "{:<34}: {}", "Writer threads", self.writer_count)?;
        for kind in [OpKind::Read, OpKind::Write] {
            let label = match kind {
                OpKind::Read => "reading",
                OpKind::Write => "writing",
            };
            writeln!(
                f,
                "{:<34}: {:?}",
                format!("Total {} duration", kind),
                self.total_duration(kind)
            )?;
            writeln!(
                f,
                "{:<34}: {}",
                format!("Total {} ops", label),
                self.total_amount(kind)
            )?;
            writeln!(
                f,
                "{:<34}: {:?}",
                format!("Avg duration per {} op", label),
                self.avg_duration_per_op(kind)
            )?;
            writeln!(
                f,
                "{:<34}: {:.2}",
                format!("Avg {} ops per second", label),
                self.avg_ops_per(kind, TimeUnit::Seconds)
            )?;
        }
        write!(f, "{}", "=".repeat(banner.len()))
    }
}

/// Serializable per-run record for CSV/JSON reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub backend: String,
    pub item_type: String,
    pub reader_count: usize,
    pub writer_count: usize,
    pub total_read_duration_ms: f64,
    pub total_write_duration_ms: f64,
    pub total_reading_ops: u64,
    pub total_writing_ops: u64,
    pub avg_duration_per_reading_op_ns: u64,
    pub avg_duration_per_writing_op_ns: u64,
    pub avg_reading_ops_per_s: f64,
    pub avg_writing_ops_per_s: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_moving_average_window() {
        let mut avg = MovingAverage::new(2);
        assert_eq!(avg.average(), 0.0);
        avg.add(1.0);
        avg.add(3.0);
        assert_eq!(avg.average(), 2.0);
        avg.add(5.0);
        assert_eq!(avg.len(), 2);
        assert_eq!(avg.average(), 4.0);
    }

    #[test]
    fn test_throughput_is_mean_of_per_worker_rates() {
        // Intended metric: mean of rates (2500), not aggregate rate (2000).
        let stats = StatsAggregator::new();
        stats.add_written(10, ms(10));
        stats.add_written(20, ms(5));

        let per_sec = stats.avg_ops_per(OpKind::Write, TimeUnit::Seconds);
        assert!((per_sec - 2500.0).abs() < 1e-6, "got {per_sec}");

        let aggregate = stats.total_amount(OpKind::Write) as f64
            / stats.total_duration(OpKind::Write).as_secs_f64();
        assert!((aggregate - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_measurements() {
        let stats = StatsAggregator::new();
        assert_eq!(stats.avg_duration_per_op(OpKind::Read), Duration::ZERO);
        assert_eq!(stats.avg_ops_per(OpKind::Read, TimeUnit::Seconds), 0.0);
        assert_eq!(stats.total_amount(OpKind::Read), 0);
        assert_eq!(stats.total_duration(OpKind::Read), Duration::ZERO);
    }

    #[test]
    fn test_zero_amount_measurement_has_zero_latency() {
        let stats = StatsAggregator::new();
        stats.add_read(0, ms(3));
        assert_eq!(stats.avg_duration_per_op(OpKind::Read), Duration::ZERO);
        assert_eq!(stats.total_duration(OpKind::Read), ms(3));
    }

    #[test]
    fn test_avg_duration_uses_integer_division() {
        let stats = StatsAggregator::new();
        stats.add_written(3, Duration::from_nanos(10));
        assert_eq!(stats.avg_duration_per_op(OpKind::Write), Duration::from_nanos(3));
    }

    #[test]
    fn test_zero_elapsed_is_clamped() {
        let stats = StatsAggregator::new();
        stats.add_written(5, Duration::ZERO);
        let per_nano = stats.avg_ops_per(OpKind::Write, TimeUnit::Nanos);
        assert_eq!(per_nano, 5.0);
    }

    #[test]
    fn test_time_unit_scaling() {
        let stats = StatsAggregator::new();
        stats.add_read(60, Duration::from_secs(1));
        assert!((stats.avg_ops_per(OpKind::Read, TimeUnit::Minutes) - 3600.0).abs() < 1e-6);
        assert!((stats.avg_ops_per(OpKind::Read, TimeUnit::Millis) - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_kinds_are_independent() {
        let stats = StatsAggregator::new();
        stats.add_written(100, ms(1));
        stats.add_read(7, ms(2));
        assert_eq!(stats.total_amount(OpKind::Write), 100);
        assert_eq!(stats.total_amount(OpKind::Read), 7);
        assert_eq!(stats.measurement_count(OpKind::Write), 1);
        assert_eq!(stats.measurement_count(OpKind::Read), 1);
    }

    #[test]
    fn test_concurrent_appends() {
        let stats = Arc::new(StatsAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = stats.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        stats.add_written(10, ms(1));
                    } else {
                        stats.add_read(10, ms(1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.total_amount(OpKind::Write), 40);
        assert_eq!(stats.total_amount(OpKind::Read), 40);
        assert_eq!(stats.total_duration(OpKind::Write), ms(4));
    }

    #[test]
    fn test_snapshot_and_summary() {
        let stats = StatsAggregator::new();
        stats.add_written(1_000, ms(2));
        stats.add_read(500, ms(1));
        let snap = stats.snapshot(RunId(7), "memory", "u64", 1, 1);

        assert_eq!(snap, stats.snapshot(RunId(7), "memory", "u64", 1, 1));
        assert_eq!(snap.total_amount(OpKind::Write), 1_000);

        let summary = snap.summary();
        assert_eq!(summary.run_id, 7);
        assert_eq!(summary.backend, "memory");
        assert_eq!(summary.total_writing_ops, 1_000);
        assert_eq!(summary.total_reading_ops, 500);
        assert_eq!(summary.avg_duration_per_writing_op_ns, 2_000);
        assert!((summary.total_write_duration_ms - 2.0).abs() < 1e-9);
        assert!((summary.avg_writing_ops_per_s - 500_000.0).abs() < 1e-3);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"avg_reading_ops_per_s\""));
    }

    #[test]
    fn test_display_block() {
        let stats = StatsAggregator::new();
        stats.add_written(10, ms(10));
        let text = stats.snapshot(RunId(3), "event_store", "String", 1, 0).to_string();
        assert!(text.starts_with("========== STATS FOR RUN 3 =========="));
        assert!(text.contains("Backend"));
        assert!(text.contains("event_store"));
        assert!(text.contains("Total writing ops"));
    }
}
