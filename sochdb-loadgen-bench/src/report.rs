//! Pretty-print evaluation results with per-run and summary tables, CSV and JSON export.

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use sochdb_loadgen::{PoolSnapshot, RunSummary};

use crate::{BenchResult, BenchSuite, RunRecord};

/// Stable CSV column order; matches the field order of [`RunSummary`].
pub const CSV_HEADER: [&str; 13] = [
    "run_id",
    "backend",
    "item_type",
    "reader_count",
    "writer_count",
    "total_read_duration_ms",
    "total_write_duration_ms",
    "total_reading_ops",
    "total_writing_ops",
    "avg_duration_per_reading_op_ns",
    "avg_duration_per_writing_op_ns",
    "avg_reading_ops_per_s",
    "avg_writing_ops_per_s",
];

// ────────────────────────────────────────────────────────────────────────────────
// Terminal output
// ────────────────────────────────────────────────────────────────────────────────

/// Worker pool counters; panicked tasks are highlighted.
pub fn print_pool(pool: &PoolSnapshot) {
    let panicked = if pool.tasks_panicked > 0 {
        pool.tasks_panicked.to_string().red().bold().to_string()
    } else {
        pool.tasks_panicked.to_string()
    };
    println!(
        "  Pool: {} tasks submitted, {} completed, {} panicked, avg {} / max {} per task",
        format_count(pool.tasks_submitted),
        format_count(pool.tasks_completed),
        panicked,
        format_micros(pool.avg_exec_time_us),
        format_micros(pool.max_exec_time_us)
    );
}

/// One row per measured run.
pub fn print_runs(records: &[RunRecord]) {
    let runs: Vec<&RunSummary> = records.iter().filter_map(|r| r.summary.as_ref()).collect();
    if runs.is_empty() {
        return;
    }

    println!("\n{}", "━━━ Runs ━━━".bold().cyan());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        "Run",
        "Backend",
        "Item",
        "W",
        "R",
        "Writes",
        "Write ops/s",
        "Write ns/op",
        "Reads",
        "Read ops/s",
        "Read ns/op",
    ]);

    for s in runs {
        table.add_row(vec![
            Cell::new(s.run_id),
            Cell::new(&s.backend),
            Cell::new(&s.item_type),
            Cell::new(s.writer_count),
            Cell::new(s.reader_count),
            Cell::new(format_count(s.total_writing_ops)),
            Cell::new(format_throughput(s.avg_writing_ops_per_s)),
            Cell::new(s.avg_duration_per_writing_op_ns),
            Cell::new(format_count(s.total_reading_ops)),
            Cell::new(format_throughput(s.avg_reading_ops_per_s)),
            Cell::new(s.avg_duration_per_reading_op_ns),
        ]);
    }

    println!("{table}");
}

/// Mean over repeated runs of one `(backend, writers, readers)` combination.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub backend: String,
    pub writers: usize,
    pub readers: usize,
    pub runs: usize,
    pub avg_writing_ops_per_s: f64,
    pub avg_reading_ops_per_s: f64,
    pub avg_duration_per_writing_op_ns: f64,
    pub avg_duration_per_reading_op_ns: f64,
}

pub fn summarize(records: &[RunRecord]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<(String, usize, usize), Vec<&RunSummary>> = BTreeMap::new();
    for r in records {
        if let Some(s) = &r.summary {
            groups
                .entry((s.backend.clone(), s.writer_count, s.reader_count))
                .or_default()
                .push(s);
        }
    }

    groups
        .into_iter()
        .map(|((backend, writers, readers), runs)| {
            let n = runs.len() as f64;
            let mean = |f: fn(&RunSummary) -> f64| runs.iter().map(|s| f(s)).sum::<f64>() / n;
            GroupSummary {
                backend,
                writers,
                readers,
                runs: runs.len(),
                avg_writing_ops_per_s: mean(|s| s.avg_writing_ops_per_s),
                avg_reading_ops_per_s: mean(|s| s.avg_reading_ops_per_s),
                avg_duration_per_writing_op_ns: mean(|s| s.avg_duration_per_writing_op_ns as f64),
                avg_duration_per_reading_op_ns: mean(|s| s.avg_duration_per_reading_op_ns as f64),
            }
        })
        .collect()
}

pub fn print_summary(records: &[RunRecord]) {
    let groups = summarize(records);
    if groups.is_empty() {
        return;
    }

    println!("\n{}", "── Summary: Mean per Configuration ──".bold().yellow());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        "Backend",
        "Writers",
        "Readers",
        "Runs",
        "Write ops/s",
        "Write ns/op",
        "Read ops/s",
        "Read ns/op",
    ]);

    // Highlight the best write throughput.
    let best = groups
        .iter()
        .map(|g| g.avg_writing_ops_per_s)
        .fold(0.0f64, f64::max);

    for g in &groups {
        let is_best = (g.avg_writing_ops_per_s - best).abs() < 0.01 && best > 0.0;
        let (name_cell, tp_cell) = if is_best {
            (
                Cell::new(format!("★ {}", g.backend)).fg(Color::Green),
                Cell::new(format_throughput(g.avg_writing_ops_per_s)).fg(Color::Green),
            )
        } else {
            (
                Cell::new(&g.backend),
                Cell::new(format_throughput(g.avg_writing_ops_per_s)),
            )
        };

        table.add_row(vec![
            name_cell,
            Cell::new(g.writers),
            Cell::new(g.readers),
            Cell::new(g.runs),
            tp_cell,
            Cell::new(format!("{:.0}", g.avg_duration_per_writing_op_ns)),
            Cell::new(format_throughput(g.avg_reading_ops_per_s)),
            Cell::new(format!("{:.0}", g.avg_duration_per_reading_op_ns)),
        ]);
    }

    println!("{table}");
}

/// Print the full evaluation report.
pub fn print_suite(suite: &BenchSuite) {
    println!(
        "\n{}",
        "╔══════════════════════════════════════════════════════════════╗"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "║          SochDB Load Generator Evaluation Report            ║"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝"
            .bold()
            .blue()
    );

    println!(
        "  OS: {}  Arch: {}  CPUs: {}  Time: {}",
        suite.system_info.os,
        suite.system_info.arch,
        suite.system_info.cpus,
        suite.system_info.timestamp
    );

    print_pool(&suite.pool);
    print_runs(&suite.records);
    print_summary(&suite.records);

    let failures: Vec<&RunRecord> = suite.records.iter().filter(|r| !r.is_success()).collect();
    if !failures.is_empty() {
        println!("\n{}", "── Failed Runs ──".bold().red());
        for r in failures {
            println!(
                "  run {} {} (W={} R={}): {}",
                r.run_id,
                r.backend.bold(),
                r.writers,
                r.readers,
                r.error.as_deref().unwrap_or("unknown error").dimmed()
            );
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// CSV export
// ────────────────────────────────────────────────────────────────────────────────

/// One row per successful run, header [`CSV_HEADER`].
pub fn export_csv(suite: &BenchSuite, path: &Path) -> BenchResult<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;

    wtr.write_record(CSV_HEADER)?;
    for summary in suite.records.iter().filter_map(|r| r.summary.as_ref()) {
        wtr.serialize(summary)?;
    }

    wtr.flush()?;
    println!("  CSV exported to {}", path.display());
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────────
// JSON export
// ────────────────────────────────────────────────────────────────────────────────

pub fn export_json(suite: &BenchSuite, path: &Path) -> BenchResult<()> {
    let json = serde_json::to_string_pretty(suite)?;
    std::fs::write(path, json)?;
    println!("  JSON exported to {}", path.display());
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────────
// Formatting helpers
// ────────────────────────────────────────────────────────────────────────────────

fn format_throughput(t: f64) -> String {
    if t >= 1_000_000.0 {
        format!("{:.2}M", t / 1_000_000.0)
    } else if t >= 1_000.0 {
        format!("{:.1}K", t / 1_000.0)
    } else {
        format!("{:.0}", t)
    }
}

fn format_micros(us: u64) -> String {
    if us >= 1_000_000 {
        format!("{:.2}s", us as f64 / 1_000_000.0)
    } else if us >= 1_000 {
        format!("{:.1}ms", us as f64 / 1_000.0)
    } else {
        format!("{}μs", us)
    }
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(run_id: u64, backend: &str, writers: usize, write_rate: f64) -> RunRecord {
        RunRecord {
            run_id,
            backend: backend.to_string(),
            generator: "Message".to_string(),
            writers,
            readers: 0,
            summary: Some(RunSummary {
                run_id,
                backend: backend.to_string(),
                item_type: "Message".to_string(),
                reader_count: 0,
                writer_count: writers,
                total_read_duration_ms: 0.0,
                total_write_duration_ms: 10.0,
                total_reading_ops: 0,
                total_writing_ops: 100,
                avg_duration_per_reading_op_ns: 0,
                avg_duration_per_writing_op_ns: 100_000,
                avg_reading_ops_per_s: 0.0,
                avg_writing_ops_per_s: write_rate,
            }),
            error: None,
        }
    }

    #[test]
    fn test_summarize_averages_repetitions() {
        let mut failed = record(4, "memory", 1, 0.0);
        failed.summary = None;
        failed.error = Some("boom".into());

        let records = vec![
            record(1, "memory", 1, 1_000.0),
            record(2, "memory", 1, 3_000.0),
            record(3, "memory", 2, 5_000.0),
            failed,
        ];
        let groups = summarize(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].writers, 1);
        assert_eq!(groups[0].runs, 2);
        assert_eq!(groups[0].avg_writing_ops_per_s, 2_000.0);
        assert_eq!(groups[1].runs, 1);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_throughput(2_500_000.0), "2.50M");
        assert_eq!(format_throughput(1_500.0), "1.5K");
        assert_eq!(format_throughput(42.0), "42");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(12_000), "12.0K");
        assert_eq!(format_micros(850), "850μs");
        assert_eq!(format_micros(2_500), "2.5ms");
        assert_eq!(format_micros(3_000_000), "3.00s");
    }

    #[test]
    fn test_csv_header_matches_summary_fields() {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(record(1, "memory", 1, 1.0).summary.unwrap()).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(header, CSV_HEADER.join(","));
    }
}
