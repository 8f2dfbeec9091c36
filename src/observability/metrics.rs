//! Write metrics registry.
//!
//! # Metrics
//! - `<prefix>_write_success_total` (counter): successful writes by database
//! - `<prefix>_write_failure_total` (counter): failed writes by database
//! - `<prefix>_write_timeout_total` (counter): timed-out writes by database
//! - `<prefix>_write_latency_seconds` (histogram): duration of every attempt
//!
//! # Design Decisions
//! - Series are created once, at construction, for every configured target;
//!   label cardinality is bounded by configuration
//! - Counters are plain atomics; each histogram has its own lock
//! - Each loop holds its own `Arc<TargetMetrics>`, so recording never looks
//!   anything up and never touches another target's series

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReporterConfig;
use crate::observability::exposition;
use crate::observability::histogram::{Histogram, HistogramSnapshot};
use crate::writer::{OutcomeKind, WriteOutcome};

/// Series for one `database_name`.
#[derive(Debug)]
pub struct TargetMetrics {
    name: String,
    success_total: AtomicU64,
    failure_total: AtomicU64,
    timeout_total: AtomicU64,
    latency: Histogram,
    /// Last outcome as `OutcomeKind as u8`, 0 before the first cycle.
    last_outcome: AtomicU8,
}

impl TargetMetrics {
    fn new(name: String, bounds: &[f64]) -> Self {
        Self {
            name,
            success_total: AtomicU64::new(0),
            failure_total: AtomicU64::new(0),
            timeout_total: AtomicU64::new(0),
            latency: Histogram::new(bounds),
            last_outcome: AtomicU8::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record one completed write attempt: its duration and exactly one counter.
    pub fn record(&self, outcome: &WriteOutcome, elapsed: Duration) {
        self.latency.observe_duration(elapsed);

        let kind = outcome.kind();
        let counter = match kind {
            OutcomeKind::Success => &self.success_total,
            OutcomeKind::Failure => &self.failure_total,
            OutcomeKind::Timeout => &self.timeout_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.last_outcome.store(kind as u8, Ordering::Relaxed);
    }

    pub fn success_total(&self) -> u64 {
        self.success_total.load(Ordering::Relaxed)
    }

    pub fn failure_total(&self) -> u64 {
        self.failure_total.load(Ordering::Relaxed)
    }

    pub fn timeout_total(&self) -> u64 {
        self.timeout_total.load(Ordering::Relaxed)
    }

    /// Completed cycles: the sum of the three outcome counters.
    pub fn cycles(&self) -> u64 {
        self.success_total() + self.failure_total() + self.timeout_total()
    }

    pub fn last_outcome(&self) -> Option<OutcomeKind> {
        OutcomeKind::from_u8(self.last_outcome.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            database_name: self.name.clone(),
            success_total: self.success_total(),
            failure_total: self.failure_total(),
            timeout_total: self.timeout_total(),
            latency: self.latency.snapshot(),
        }
    }
}

/// Point-in-time copy of one target's series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub database_name: String,
    pub success_total: u64,
    pub failure_total: u64,
    pub timeout_total: u64,
    pub latency: HistogramSnapshot,
}

/// Process-wide write metrics, constructed once and shared by reference.
#[derive(Debug)]
pub struct MetricsRegistry {
    prefix: String,
    bounds: Vec<f64>,
    series: Vec<Arc<TargetMetrics>>,
    index: HashMap<String, usize>,
}

impl MetricsRegistry {
    /// Create zeroed series for every name. Repeated names share one series.
    pub fn new<I, S>(prefix: &str, names: I, bounds: &[f64]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut series = Vec::new();
        let mut index = HashMap::new();
        for name in names {
            let name = name.into();
            if index.contains_key(&name) {
                continue;
            }
            index.insert(name.clone(), series.len());
            series.push(Arc::new(TargetMetrics::new(name, bounds)));
        }

        let bounds = series
            .first()
            .map(|s| s.latency.bounds().to_vec())
            .unwrap_or_else(|| Histogram::new(bounds).bounds().to_vec());

        Self {
            prefix: prefix.to_string(),
            bounds,
            series,
            index,
        }
    }

    pub fn from_config(config: &ReporterConfig) -> Self {
        Self::new(
            &config.metrics.prefix,
            config.target_names(),
            &config.metrics.latency_buckets,
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Histogram upper bounds shared by every series, `+Inf` excluded.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Handle to a target's series, if it was configured.
    pub fn series(&self, name: &str) -> Option<Arc<TargetMetrics>> {
        self.index.get(name).map(|&i| self.series[i].clone())
    }

    /// Record an attempt by name. Unknown names are dropped and reported as `false`.
    pub fn record(&self, name: &str, outcome: &WriteOutcome, elapsed: Duration) -> bool {
        match self.index.get(name) {
            Some(&i) => {
                self.series[i].record(outcome, elapsed);
                true
            }
            None => {
                tracing::warn!(database_name = %name, "Dropping observation for unconfigured database");
                false
            }
        }
    }

    /// Per-series snapshots in configuration order.
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        self.series.iter().map(|s| s.snapshot()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TargetMetrics>> {
        self.series.iter()
    }

    /// Render the text exposition of every series.
    pub fn render(&self) -> String {
        exposition::render(&self.prefix, &self.bounds, &self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: [f64; 3] = [0.1, 0.5, 1.0];

    #[test]
    fn test_series_exist_at_zero() {
        let registry = MetricsRegistry::new("db", ["prod", "analytics"], &BOUNDS);
        let snaps = registry.snapshot();
        assert_eq!(snaps.len(), 2);
        for snap in snaps {
            assert_eq!(snap.success_total + snap.failure_total + snap.timeout_total, 0);
            assert_eq!(snap.latency.count, 0);
        }
    }

    #[test]
    fn test_exactly_one_counter_per_attempt() {
        let registry = MetricsRegistry::new("db", ["x"], &BOUNDS);
        let series = registry.series("x").unwrap();

        series.record(&WriteOutcome::Success, Duration::from_millis(10));
        series.record(&WriteOutcome::Failure("refused".into()), Duration::from_millis(20));
        series.record(&WriteOutcome::Timeout, Duration::from_secs(5));
        series.record(&WriteOutcome::Success, Duration::from_millis(30));

        assert_eq!(series.success_total(), 2);
        assert_eq!(series.failure_total(), 1);
        assert_eq!(series.timeout_total(), 1);
        assert_eq!(series.cycles(), 4);
        assert_eq!(series.snapshot().latency.count, series.cycles());
        assert_eq!(series.last_outcome(), Some(OutcomeKind::Success));
    }

    #[test]
    fn test_targets_are_isolated() {
        let registry = MetricsRegistry::new("db", ["a", "b"], &BOUNDS);
        for _ in 0..5 {
            registry.record("a", &WriteOutcome::Timeout, Duration::from_millis(1));
        }

        let b = registry.series("b").unwrap();
        assert_eq!(b.cycles(), 0);
        assert_eq!(b.last_outcome(), None);
        assert_eq!(registry.series("a").unwrap().timeout_total(), 5);
    }

    #[test]
    fn test_unknown_names_do_not_create_series() {
        let registry = MetricsRegistry::new("db", ["a"], &BOUNDS);
        assert!(!registry.record("ghost", &WriteOutcome::Success, Duration::ZERO));
        assert_eq!(registry.snapshot().len(), 1);
        assert!(registry.series("ghost").is_none());
    }

    #[test]
    fn test_duplicate_names_share_a_series() {
        let registry = MetricsRegistry::new("db", ["a", "a"], &BOUNDS);
        assert_eq!(registry.iter().count(), 1);
    }

    #[test]
    fn test_snapshot_is_idempotent_without_writes() {
        let registry = MetricsRegistry::new("db", ["a"], &BOUNDS);
        registry.record("a", &WriteOutcome::Success, Duration::from_millis(250));
        assert_eq!(registry.snapshot(), registry.snapshot());
        assert_eq!(registry.render(), registry.render());
    }
}
