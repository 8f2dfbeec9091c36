//! Per-target periodic write loop.
//!
//! # Responsibilities
//! - Bootstrap the target's schema, with bounded retries
//! - Run one write cycle per tick, never two at once
//! - Exit on shutdown once the current cycle is over

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::config::ScheduleConfig;
use crate::lifecycle::ShutdownListener;
use crate::observability::TargetMetrics;
use crate::reporter::cycle::run_write_cycle;
use crate::resilience::{bounded, Backoff};
use crate::writer::DatabaseWriter;

/// Drives one database target.
pub struct TargetReporter {
    writer: Arc<dyn DatabaseWriter>,
    metrics: Arc<TargetMetrics>,
    interval: Duration,
    write_timeout: Duration,
    bootstrap: Backoff,
}

impl TargetReporter {
    pub fn new(
        writer: Arc<dyn DatabaseWriter>,
        metrics: Arc<TargetMetrics>,
        schedule: &ScheduleConfig,
    ) -> Self {
        Self {
            writer,
            metrics,
            interval: schedule.interval(),
            write_timeout: schedule.write_timeout(),
            bootstrap: Backoff::default(),
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: Backoff) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn name(&self) -> &str {
        self.metrics.name()
    }

    /// Run until shutdown.
    ///
    /// The first cycle starts immediately, then one every `interval`. A cycle
    /// that overruns the interval delays the next tick instead of stacking
    /// up missed ones.
    pub async fn run(self, mut shutdown: ShutdownListener) {
        if self.writer.needs_prepare() {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!(database_name = %self.name(), "Shutdown during bootstrap");
                    return;
                }
                _ = self.prepare() => {}
            }
        }

        tracing::info!(
            database_name = %self.name(),
            interval_ms = self.interval.as_millis() as u64,
            timeout_ms = self.write_timeout.as_millis() as u64,
            "Write loop starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!(
                        database_name = %self.name(),
                        cycles = self.metrics.cycles(),
                        "Write loop received shutdown signal, exiting"
                    );
                    break;
                }
                _ = ticker.tick() => {
                    run_write_cycle(self.writer.as_ref(), &self.metrics, self.write_timeout).await;
                }
            }
        }
    }

    /// Returns whether the schema is in place. Failure is logged, not fatal.
    async fn prepare(&self) -> bool {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match bounded(self.write_timeout, self.writer.prepare()).await {
                Ok(Ok(())) => return true,
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };

            if !self.bootstrap.should_retry(attempt) {
                tracing::error!(
                    database_name = %self.name(),
                    attempts = attempt,
                    error = %error,
                    "Schema bootstrap failed, writes will be attempted anyway"
                );
                return false;
            }

            let delay = self.bootstrap.delay(attempt);
            tracing::warn!(
                database_name = %self.name(),
                attempt,
                delay = ?delay,
                error = %error,
                "Schema bootstrap failed, retrying"
            );
            time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::observability::MetricsRegistry;
    use crate::reporter::testing::MockWriter;
    use crate::writer::{FailurePolicy, SimulatedWriter};
    use std::sync::atomic::Ordering;

    fn schedule(interval_secs: f64) -> ScheduleConfig {
        ScheduleConfig {
            interval_secs,
            write_timeout_secs: 5.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let registry = MetricsRegistry::new("db", ["x"], &[0.005, 0.025, 0.1]);
        let shutdown = Shutdown::new();
        let writer = Arc::new(MockWriter::succeeding(Duration::from_millis(10)));
        let reporter = TargetReporter::new(writer, registry.series("x").unwrap(), &schedule(1.0));
        let handle = tokio::spawn(reporter.run(shutdown.subscribe()));

        time::sleep(Duration::from_millis(3500)).await;

        let series = registry.series("x").unwrap();
        assert_eq!(series.success_total(), 4);
        assert_eq!(series.failure_total(), 0);
        assert_eq!(series.timeout_total(), 0);

        let latency = series.snapshot().latency;
        assert_eq!(latency.count, 4);
        assert_eq!(latency.count_at(0.005), Some(0));
        assert_eq!(latency.count_at(0.025), Some(4));

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_timeout_policy() {
        let registry = MetricsRegistry::new("db", ["x"], &[0.1]);
        let shutdown = Shutdown::new();
        let writer = Arc::new(SimulatedWriter::new("x", FailurePolicy::AlwaysTimeout));
        let reporter = TargetReporter::new(writer, registry.series("x").unwrap(), &schedule(1.0));
        let handle = tokio::spawn(reporter.run(shutdown.subscribe()));

        time::sleep(Duration::from_millis(4500)).await;
        shutdown.trigger();
        handle.await.unwrap();

        let series = registry.series("x").unwrap();
        assert_eq!(series.timeout_total(), 5);
        assert_eq!(series.success_total(), 0);
        assert_eq!(series.failure_total(), 0);
        assert_eq!(series.snapshot().latency.count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_never_overlap() {
        let registry = MetricsRegistry::new("db", ["x"], &[1.0]);
        let shutdown = Shutdown::new();
        let writer = Arc::new(MockWriter::succeeding(Duration::from_millis(1500)));
        let reporter = TargetReporter::new(
            writer.clone(),
            registry.series("x").unwrap(),
            &schedule(1.0),
        );
        let handle = tokio::spawn(reporter.run(shutdown.subscribe()));

        time::sleep(Duration::from_millis(4000)).await;

        // Cycles start at 0s, 1.5s and 3s: overruns delay the schedule.
        assert_eq!(writer.writes.load(Ordering::SeqCst), 3);
        assert_eq!(writer.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(registry.series("x").unwrap().success_total(), 2);

        shutdown.trigger();
        handle.await.unwrap();
        assert_eq!(registry.series("x").unwrap().success_total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_target_does_not_delay_others() {
        let registry = MetricsRegistry::new("db", ["slow", "fast"], &[1.0]);
        let shutdown = Shutdown::new();

        let slow = TargetReporter::new(
            Arc::new(MockWriter::succeeding(Duration::from_secs(60))),
            registry.series("slow").unwrap(),
            &schedule(1.0),
        );
        let fast = TargetReporter::new(
            Arc::new(MockWriter::succeeding(Duration::from_millis(1))),
            registry.series("fast").unwrap(),
            &schedule(1.0),
        );
        let handles = vec![
            tokio::spawn(slow.run(shutdown.subscribe())),
            tokio::spawn(fast.run(shutdown.subscribe())),
        ];

        time::sleep(Duration::from_millis(5500)).await;
        shutdown.trigger();
        for handle in handles {
            handle.await.unwrap();
        }

        let slow = registry.series("slow").unwrap();
        let fast = registry.series("fast").unwrap();
        assert_eq!(fast.success_total(), 6);
        assert!(slow.timeout_total() >= 1);
        assert_eq!(slow.success_total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_retries_then_writes_anyway() {
        let registry = MetricsRegistry::new("db", ["x"], &[1.0]);
        let shutdown = Shutdown::new();
        let writer = Arc::new(MockWriter::failing(Duration::from_millis(1)).with_prepare(false));
        let reporter = TargetReporter::new(
            writer.clone(),
            registry.series("x").unwrap(),
            &schedule(1.0),
        )
        .with_bootstrap(Backoff::new(3, Duration::from_millis(100), Duration::from_secs(1)));
        let handle = tokio::spawn(reporter.run(shutdown.subscribe()));

        time::sleep(Duration::from_secs(2)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(writer.prepares.load(Ordering::SeqCst), 3);
        assert!(registry.series("x").unwrap().failure_total() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_success_runs_once() {
        let registry = MetricsRegistry::new("db", ["x"], &[1.0]);
        let shutdown = Shutdown::new();
        let writer = Arc::new(MockWriter::succeeding(Duration::from_millis(1)).with_prepare(true));
        let reporter = TargetReporter::new(writer.clone(), registry.series("x").unwrap(), &schedule(1.0));
        let handle = tokio::spawn(reporter.run(shutdown.subscribe()));

        time::sleep(Duration::from_millis(2500)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(writer.prepares.load(Ordering::SeqCst), 1);
        assert_eq!(registry.series("x").unwrap().success_total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_bootstrap() {
        let registry = MetricsRegistry::new("db", ["x"], &[1.0]);
        let shutdown = Shutdown::new();
        let writer = Arc::new(MockWriter::failing(Duration::from_millis(1)).with_prepare(false));
        let reporter = TargetReporter::new(writer.clone(), registry.series("x").unwrap(), &schedule(1.0))
            .with_bootstrap(Backoff::new(100, Duration::from_secs(10), Duration::from_secs(10)));
        let handle = tokio::spawn(reporter.run(shutdown.subscribe()));

        time::sleep(Duration::from_secs(1)).await;
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(writer.writes.load(Ordering::SeqCst), 0);
        assert_eq!(registry.series("x").unwrap().cycles(), 0);
    }
}
