//! Prometheus text exposition format.
//!
//! Renders registry snapshots for scraping by a Prometheus server or a
//! compatible agent. Families are emitted in a fixed order and series within
//! a family follow configuration order, so identical state renders to
//! identical bytes.

use std::fmt::Write as _;

use crate::observability::metrics::SeriesSnapshot;

/// Content type of the rendered body.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Label partitioning every series.
pub const DATABASE_LABEL: &str = "database_name";

/// Render snapshots into Prometheus text format.
///
/// Bucket lines follow `bounds`, so every series of the family exposes the
/// same `le` set. A snapshot missing one of those bounds has that line
/// omitted and a warning logged.
pub fn render(prefix: &str, bounds: &[f64], series: &[SeriesSnapshot]) -> String {
    let mut out = String::with_capacity(256 + series.len() * (bounds.len() + 6) * 64);

    let counters: [(&str, &str, fn(&SeriesSnapshot) -> u64); 3] = [
        (
            "write_success_total",
            "Total count of successful database write operations.",
            |s| s.success_total,
        ),
        (
            "write_failure_total",
            "Total count of failed database write operations.",
            |s| s.failure_total,
        ),
        (
            "write_timeout_total",
            "Total count of database write operations that timed out.",
            |s| s.timeout_total,
        ),
    ];

    for (base, help, value) in counters {
        let name = metric_name(prefix, base);
        header(&mut out, &name, help, "counter");
        for s in series {
            let _ = writeln!(
                out,
                "{}{{{}=\"{}\"}} {}",
                name,
                DATABASE_LABEL,
                escape_label_value(&s.database_name),
                value(s)
            );
        }
    }

    let name = metric_name(prefix, "write_latency_seconds");
    header(
        &mut out,
        &name,
        "Latency of database write operations to the timestamps table.",
        "histogram",
    );
    for s in series {
        let db = escape_label_value(&s.database_name);
        for bound in bounds {
            let Some(count) = s.latency.count_at(*bound) else {
                tracing::warn!(
                    database_name = %s.database_name,
                    le = bound,
                    "Histogram snapshot lacks a configured bucket"
                );
                continue;
            };
            let _ = writeln!(
                out,
                "{}_bucket{{le=\"{}\",{}=\"{}\"}} {}",
                name, bound, DATABASE_LABEL, db, count
            );
        }
        let _ = writeln!(
            out,
            "{}_bucket{{le=\"+Inf\",{}=\"{}\"}} {}",
            name, DATABASE_LABEL, db, s.latency.count
        );
        let _ = writeln!(
            out,
            "{}_sum{{{}=\"{}\"}} {}",
            name, DATABASE_LABEL, db, s.latency.sum
        );
        let _ = writeln!(
            out,
            "{}_count{{{}=\"{}\"}} {}",
            name, DATABASE_LABEL, db, s.latency.count
        );
    }

    out
}

/// `prefix_base`, or `base` alone when the prefix is empty.
pub fn metric_name(prefix: &str, base: &str) -> String {
    if prefix.is_empty() {
        base.to_string()
    } else {
        format!("{}_{}", prefix, base)
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

/// Escape `\`, `"` and newlines as the text format requires.
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
