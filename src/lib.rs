//! Database write reporter.
//!
//! Periodically writes a timestamp row to one or more PostgreSQL databases
//! and exposes per-database outcome counters and a latency histogram for
//! Prometheus to scrape.
//!
//! # Architecture Overview
//!
//! ```text
//!     environment ──▶ config ──▶ MetricsRegistry (one series per target)
//!                                   ▲                    │
//!                                   │ record             │ render
//!     ┌──────────────────────┐      │                    ▼
//!     │ reporter (per target)│──────┘            ┌──────────────┐
//!     │  tick → cycle        │                   │ http /metrics│◀── scrape
//!     │   └▶ writer          │                   └──────────────┘
//!     │      postgres |      │
//!     │      simulated       │
//!     └──────────────────────┘
//!
//!     lifecycle: signals → Shutdown → reporters stop, server drains
//! ```

// Core subsystems
pub mod config;
pub mod reporter;
pub mod writer;

// Exposition
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ReporterConfig;
pub use lifecycle::{Application, Shutdown};
pub use observability::MetricsRegistry;
