//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Reporter loops produce:
//!     → metrics.rs (per-database counters and latency histogram)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → exposition.rs renders metrics for GET /metrics (Prometheus scrape)
//!     → log aggregation reads stdout
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit object owned by startup, never a global
//! - Metric updates are cheap (atomic increments, one short lock per histogram)
//! - Exposition reads per-series snapshots; a scrape never blocks writers on I/O

pub mod exposition;
pub mod histogram;
pub mod logging;
pub mod metrics;

pub use histogram::{Histogram, HistogramSnapshot};
pub use metrics::{MetricsRegistry, SeriesSnapshot, TargetMetrics};
