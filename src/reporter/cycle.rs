//! A single write cycle.

use std::time::Duration;

use tokio::time::Instant;
use tracing::field::Empty;
use tracing::Instrument;

use crate::observability::TargetMetrics;
use crate::resilience::bounded;
use crate::writer::postgres::INSERT_TIMESTAMP;
use crate::writer::{DatabaseWriter, WriteOutcome};

/// Attempt one write, classify it and record it.
///
/// The attempt is abandoned once `write_timeout` passes. Its duration is
/// observed whatever the outcome, and exactly one outcome counter moves.
/// Errors never escape: the outcome is returned as data.
///
/// Each cycle runs inside a `db_write` span carrying the database semantic
/// fields; the outcome and status are recorded on it when the cycle ends.
pub async fn run_write_cycle(
    writer: &dyn DatabaseWriter,
    metrics: &TargetMetrics,
    write_timeout: Duration,
) -> WriteOutcome {
    let span = tracing::info_span!(
        "db_write",
        database_name = %metrics.name(),
        db.system = "postgresql",
        db.name = %metrics.name(),
        db.operation = "INSERT",
        db.statement = INSERT_TIMESTAMP,
        outcome = Empty,
        otel.status_code = Empty,
        db.timeout = Empty,
    );
    classify_and_record(writer, metrics, write_timeout)
        .instrument(span)
        .await
}

async fn classify_and_record(
    writer: &dyn DatabaseWriter,
    metrics: &TargetMetrics,
    write_timeout: Duration,
) -> WriteOutcome {
    let start = Instant::now();

    let outcome = match bounded(write_timeout, writer.write()).await {
        Ok(Ok(())) => WriteOutcome::Success,
        Ok(Err(e)) if e.is_timeout() => WriteOutcome::Timeout,
        Ok(Err(e)) => WriteOutcome::Failure(e.to_string()),
        Err(_) => WriteOutcome::Timeout,
    };

    let elapsed = start.elapsed();
    metrics.record(&outcome, elapsed);

    let span = tracing::Span::current();
    span.record("outcome", outcome.kind().as_str());
    span.record(
        "otel.status_code",
        if outcome == WriteOutcome::Success { "OK" } else { "ERROR" },
    );
    if outcome == WriteOutcome::Timeout {
        span.record("db.timeout", true);
    }

    let latency_ms = elapsed.as_secs_f64() * 1000.0;
    match &outcome {
        WriteOutcome::Success => tracing::info!(
            database_name = %metrics.name(),
            latency_ms,
            "Timestamp written"
        ),
        WriteOutcome::Failure(reason) => tracing::warn!(
            database_name = %metrics.name(),
            latency_ms,
            error = %reason,
            "Database write failed"
        ),
        WriteOutcome::Timeout => tracing::warn!(
            database_name = %metrics.name(),
            latency_ms,
            timeout_ms = write_timeout.as_millis() as u64,
            "Database write timed out"
        ),
    }

    outcome
}
