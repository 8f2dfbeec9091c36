//! Reporter subsystem.
//!
//! # Data Flow
//! ```text
//! ReporterConfig + MetricsRegistry
//!     → build_reporters() (one TargetReporter per target)
//!     → ReporterSet::spawn() (one task per target)
//!         → scheduler.rs: tick → cycle.rs → writer + TargetMetrics
//! ```
//!
//! # Design Decisions
//! - One task per target; a stuck target never delays another
//! - A target runs at most one cycle at a time
//! - Shutdown is observed between cycles, never in the middle of one

pub mod cycle;
pub mod scheduler;

use tokio::task::JoinHandle;

use crate::config::ReporterConfig;
use crate::lifecycle::Shutdown;
use crate::observability::MetricsRegistry;
use crate::writer::writer_for;

pub use cycle::run_write_cycle;
pub use scheduler::TargetReporter;

/// Build one reporter per configured target, sharing the registry's series.
pub fn build_reporters(config: &ReporterConfig, registry: &MetricsRegistry) -> Vec<TargetReporter> {
    let write_timeout = config.schedule.write_timeout();

    config
        .targets
        .iter()
        .enumerate()
        .filter_map(|(index, target)| {
            let Some(metrics) = registry.series(&target.name) else {
                tracing::warn!(database_name = %target.name, "No metrics series for target, skipping");
                return None;
            };
            let writer = writer_for(target, index, &config.simulation, write_timeout);
            Some(TargetReporter::new(writer, metrics, &config.schedule))
        })
        .collect()
}

/// Running reporter tasks.
pub struct ReporterSet {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl ReporterSet {
    /// Spawn every reporter. Each subscribes to `shutdown` before it starts.
    pub fn spawn(reporters: Vec<TargetReporter>, shutdown: &Shutdown) -> Self {
        let tasks = reporters
            .into_iter()
            .map(|reporter| {
                let name = reporter.name().to_string();
                let rx = shutdown.subscribe();
                (name, tokio::spawn(reporter.run(rx)))
            })
            .collect();
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task to exit.
    pub async fn join(self) {
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                tracing::error!(database_name = %name, error = %e, "Reporter task failed");
            }
        }
    }
}
