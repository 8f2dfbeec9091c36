//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (read variables, parse typed values)
//!     → validation.rs (semantic checks)
//!     → ReporterConfig (validated, immutable)
//!     → shared by value or Arc with every subsystem
//! ```
//!
//! # Design Decisions
//! - Environment is read exactly once at startup
//! - All problems are collected and reported together
//! - Any problem is fatal; nothing is silently skipped

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    DatabaseTarget, FailureMode, ListenerConfig, MetricsConfig, ReporterConfig, ScheduleConfig,
    SimulationConfig, TargetMode,
};
pub use validation::ValidationError;
