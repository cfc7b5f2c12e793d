//! CLI output formatting for every `folio` command.
//!
//! # Output Format
//!
//! ## Lint / Rebuild
//!
//! ```text
//! Scanned 9 files, indexed 7 items
//!
//! Issues (2)
//! 001 parse
//!     content/posts/broken.md: missing required field 'title'
//! 002 unresolvable-route
//!     post/undated-note: cannot resolve route '/blog/{year}/{slug}/': ...
//!
//! Generation gen-20240103T101500.123456-4242-000000
//!     Backend: array (binary codec)
//!     Digest: 3fa4c1d2e5b6
//!     Cache: 2 generation(s) kept, 1 removed
//!     Took: 41.2ms
//! ```
//!
//! ## Benchmark
//!
//! ```text
//! array (7 items, built in 12.0ms)
//!     Disk: 14.2 KiB   Memory: 9.8 KiB
//!     count              0.4µs mean     1.2µs max
//!     all_meta          11.0µs mean    15.3µs max
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::benchmark::BenchmarkReport;
use crate::fingerprint;
use crate::indexer::{IndexStatus, LintReport, RebuildReport};
use crate::types::IndexIssue;
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count, binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Durations as µs below a millisecond, ms below a second, s above.
pub fn format_duration(d: Duration) -> String {
    let micros = d.as_secs_f64() * 1_000_000.0;
    if micros < 1000.0 {
        format!("{micros:.1}µs")
    } else if micros < 1_000_000.0 {
        format!("{:.1}ms", micros / 1000.0)
    } else {
        format!("{:.2}s", micros / 1_000_000.0)
    }
}

fn summary_line(files_seen: usize, item_count: usize) -> String {
    format!("Scanned {files_seen} files, indexed {item_count} items")
}

/// Numbered issue list, kind on the header line, message indented below.
pub fn format_issues(issues: &[IndexIssue]) -> Vec<String> {
    if issues.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("Issues ({})", issues.len())];
    for (i, issue) in issues.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), issue.kind()));
        lines.push(format!("{}{issue}", indent(1)));
    }
    lines
}

// ============================================================================
// lint
// ============================================================================

pub fn format_lint_report(report: &LintReport) -> Vec<String> {
    let mut lines = vec![summary_line(report.files_seen, report.item_count)];
    if report.is_clean() {
        lines.push("No issues found".to_string());
    } else {
        lines.push(String::new());
        lines.extend(format_issues(&report.issues));
    }
    lines
}

pub fn print_lint_report(report: &LintReport) {
    for line in format_lint_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// rebuild
// ============================================================================

pub fn format_rebuild_report(report: &RebuildReport) -> Vec<String> {
    let mut lines = vec![summary_line(report.files_seen, report.item_count)];
    if !report.issues.is_empty() {
        lines.push(String::new());
        lines.extend(format_issues(&report.issues));
    }
    lines.push(String::new());
    lines.push(format!("Generation {}", report.generation));
    lines.push(format!(
        "{}Backend: {} ({} codec)",
        indent(1),
        report.backend,
        report.codec
    ));
    lines.push(format!(
        "{}Digest: {}",
        indent(1),
        fingerprint::short(&report.digest)
    ));
    lines.push(format!("{}Cache: {}", indent(1), report.gc));
    lines.push(format!("{}Took: {}", indent(1), format_duration(report.elapsed)));
    lines
}

pub fn print_rebuild_report(report: &RebuildReport) {
    for line in format_rebuild_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// status
// ============================================================================

pub fn format_status(status: &IndexStatus) -> Vec<String> {
    let mut lines = Vec::new();
    match &status.committed {
        None => lines.push("No committed index".to_string()),
        Some(record) => {
            lines.push(format!("Generation {}", record.generation));
            lines.push(format!(
                "{}Built: {}",
                indent(1),
                record.built_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            lines.push(format!(
                "{}Backend: {} ({} codec), {} items",
                indent(1),
                record.backend,
                record.codec,
                record.item_count
            ));
            lines.push(format!(
                "{}Digest: {}",
                indent(1),
                fingerprint::short(&record.digest)
            ));
        }
    }
    lines.push(format!(
        "Current digest: {} ({} files)",
        fingerprint::short(&status.current.digest),
        status.current.files
    ));
    lines.push(
        if status.fresh {
            "Index is fresh"
        } else {
            "Index is stale"
        }
        .to_string(),
    );
    lines.push(format!("Generations on disk: {}", status.generations.len()));
    lines
}

pub fn print_status(status: &IndexStatus) {
    for line in format_status(status) {
        println!("{}", line);
    }
}

// ============================================================================
// benchmark
// ============================================================================

pub fn format_benchmark(report: &BenchmarkReport) -> Vec<String> {
    let mut lines = vec![format!("{} iteration(s) per operation", report.iterations)];
    for result in &report.results {
        lines.push(String::new());
        lines.push(format!(
            "{} ({} items, built in {})",
            result.backend,
            result.item_count,
            format_duration(result.build)
        ));
        lines.push(format!(
            "{}Disk: {}   Memory: {}",
            indent(1),
            format_bytes(result.disk_bytes),
            format_bytes(result.memory_bytes as u64)
        ));
        for op in &result.ops {
            lines.push(format!(
                "{}{:<14} {:>10} mean {:>10} max",
                indent(1),
                op.name,
                format_duration(op.mean),
                format_duration(op.max)
            ));
        }
    }
    if let Some(mismatches) = &report.mismatches {
        lines.push(String::new());
        if mismatches.is_empty() {
            lines.push("Backends agree on every probe".to_string());
        } else {
            lines.push(format!("Backends disagree ({})", mismatches.len()));
            for (i, m) in mismatches.iter().enumerate() {
                lines.push(format!("{} {} [{}]", format_index(i + 1), m.probe, m.backend));
                lines.push(format!("{}expected: {}", indent(1), m.expected.join(", ")));
                lines.push(format!("{}actual:   {}", indent(1), m.actual.join(", ")));
            }
        }
    }
    lines
}

pub fn print_benchmark(report: &BenchmarkReport) {
    for line in format_benchmark(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::backend::codec::Codec;
    use crate::benchmark::{BackendBenchmark, Mismatch, OpTiming};
    use crate::cache::GcStats;
    use crate::fingerprint::{FORMAT_VERSION, Fingerprint, FingerprintRecord};
    use chrono::{TimeZone, Utc};

    fn parse_issue() -> IndexIssue {
        IndexIssue::Parse {
            path: "content/posts/broken.md".into(),
            message: "missing required field 'title'".into(),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn durations_pick_a_unit() {
        assert_eq!(format_duration(Duration::from_nanos(1500)), "1.5µs");
        assert_eq!(format_duration(Duration::from_micros(41_200)), "41.2ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // lint / rebuild
    // =========================================================================

    #[test]
    fn clean_lint() {
        let report = LintReport {
            files_seen: 3,
            item_count: 3,
            issues: vec![],
        };
        assert_eq!(
            format_lint_report(&report),
            vec!["Scanned 3 files, indexed 3 items", "No issues found"]
        );
    }

    #[test]
    fn lint_lists_numbered_issues() {
        let report = LintReport {
            files_seen: 2,
            item_count: 1,
            issues: vec![parse_issue()],
        };
        let lines = format_lint_report(&report);
        assert_eq!(lines[2], "Issues (1)");
        assert_eq!(lines[3], "001 parse");
        assert_eq!(
            lines[4],
            "    content/posts/broken.md: missing required field 'title'"
        );
    }

    #[test]
    fn rebuild_shows_generation_details() {
        let report = RebuildReport {
            generation: "gen-x".into(),
            backend: BackendKind::Array,
            codec: Codec::Json,
            digest: "0123456789abcdef".into(),
            item_count: 4,
            files_seen: 4,
            issues: vec![],
            gc: GcStats {
                removed: vec![],
                kept: 1,
            },
            elapsed: Duration::from_millis(5),
        };
        let lines = format_rebuild_report(&report);
        assert_eq!(lines[2], "Generation gen-x");
        assert_eq!(lines[3], "    Backend: array (json codec)");
        assert_eq!(lines[4], "    Digest: 0123456789ab");
        assert_eq!(lines[5], "    Cache: 1 generation(s) kept");
        assert_eq!(lines[6], "    Took: 5.0ms");
    }

    // =========================================================================
    // status
    // =========================================================================

    #[test]
    fn status_without_index() {
        let status = IndexStatus {
            committed: None,
            current: Fingerprint {
                digest: "ffffffffffffffff".into(),
                files: 2,
            },
            fresh: false,
            generations: vec![],
        };
        let lines = format_status(&status);
        assert_eq!(lines[0], "No committed index");
        assert_eq!(lines[1], "Current digest: ffffffffffff (2 files)");
        assert_eq!(lines[2], "Index is stale");
    }

    #[test]
    fn status_with_record() {
        let status = IndexStatus {
            committed: Some(FingerprintRecord {
                format_version: FORMAT_VERSION,
                digest: "aaaaaaaaaaaaaaaa".into(),
                built_at: Utc.with_ymd_and_hms(2024, 1, 3, 10, 15, 0).unwrap(),
                generation: "gen-a".into(),
                backend: "sqlite".into(),
                codec: "binary".into(),
                item_count: 9,
            }),
            current: Fingerprint {
                digest: "aaaaaaaaaaaaaaaa".into(),
                files: 9,
            },
            fresh: true,
            generations: vec!["gen-a".into()],
        };
        let lines = format_status(&status);
        assert_eq!(lines[1], "    Built: 2024-01-03 10:15:00 UTC");
        assert_eq!(lines[2], "    Backend: sqlite (binary codec), 9 items");
        assert_eq!(lines[5], "Index is fresh");
        assert_eq!(lines[6], "Generations on disk: 1");
    }

    // =========================================================================
    // benchmark
    // =========================================================================

    #[test]
    fn benchmark_lists_ops_and_mismatches() {
        let report = BenchmarkReport {
            iterations: 5,
            results: vec![BackendBenchmark {
                backend: BackendKind::Array,
                item_count: 7,
                build: Duration::from_millis(12),
                disk_bytes: 2048,
                memory_bytes: 1024,
                ops: vec![OpTiming {
                    name: "count",
                    mean: Duration::from_nanos(400),
                    max: Duration::from_nanos(1200),
                }],
            }],
            mismatches: Some(vec![Mismatch {
                probe: "all_meta(post)".into(),
                backend: BackendKind::Sqlite,
                expected: vec!["a".into(), "b".into()],
                actual: vec!["b".into(), "a".into()],
            }]),
        };
        let lines = format_benchmark(&report);
        assert_eq!(lines[0], "5 iteration(s) per operation");
        assert_eq!(lines[2], "array (7 items, built in 12.0ms)");
        assert_eq!(lines[3], "    Disk: 2.0 KiB   Memory: 1.0 KiB");
        assert!(lines[4].starts_with("    count"));
        assert_eq!(lines[6], "Backends disagree (1)");
        assert_eq!(lines[7], "001 all_meta(post) [sqlite]");
        assert_eq!(lines[8], "    expected: a, b");
    }
}
