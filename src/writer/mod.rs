//! Database writers.
//!
//! # Data Flow
//! ```text
//! DatabaseTarget (config)
//!     → writer_for()
//!         simulate_failure = false → postgres.rs (real insert)
//!         simulate_failure = true  → simulated.rs (FailurePolicy)
//!     → Arc<dyn DatabaseWriter>, owned by one reporter loop
//! ```
//!
//! Writers only report what happened. Deadlines, classification into
//! outcomes and metrics are the reporter's job.

pub mod postgres;
pub mod simulated;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DatabaseTarget, SimulationConfig};

pub use postgres::PostgresWriter;
pub use simulated::{FailurePolicy, SimulatedWriter};

/// Result of one write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Success,
    Failure(String),
    Timeout,
}

impl WriteOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            WriteOutcome::Success => OutcomeKind::Success,
            WriteOutcome::Failure(_) => OutcomeKind::Failure,
            WriteOutcome::Timeout => OutcomeKind::Timeout,
        }
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Failure(reason) => write!(f, "failure: {}", reason),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Outcome without its payload, storable in an atomic.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success = 1,
    Failure = 2,
    Timeout = 3,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Timeout => "timeout",
        }
    }

    /// Inverse of `kind as u8`; zero and unknown values mean "no outcome yet".
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            1 => Some(OutcomeKind::Success),
            2 => Some(OutcomeKind::Failure),
            3 => Some(OutcomeKind::Timeout),
            _ => None,
        }
    }
}

/// Error reported by a writer.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("write timed out")]
    TimedOut,

    #[error("{0}")]
    Simulated(String),
}

impl WriteError {
    /// Whether the error means the database did not answer in time.
    pub fn is_timeout(&self) -> bool {
        match self {
            WriteError::TimedOut => true,
            WriteError::Database(sqlx::Error::PoolTimedOut) => true,
            WriteError::Database(sqlx::Error::Io(e)) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Something a reporter loop can write a timestamp to.
#[async_trait]
pub trait DatabaseWriter: Send + Sync {
    /// One-time setup before the first write. May be retried.
    async fn prepare(&self) -> Result<(), WriteError> {
        Ok(())
    }

    /// Write one timestamp row.
    async fn write(&self) -> Result<(), WriteError>;

    /// Whether this writer needs `prepare` at all.
    fn needs_prepare(&self) -> bool {
        false
    }
}

/// Build the writer a target asks for.
///
/// `index` is the target's position in the configuration; it keeps seeded
/// random policies distinct per target while staying reproducible.
pub fn writer_for(
    target: &DatabaseTarget,
    index: usize,
    simulation: &SimulationConfig,
    write_timeout: Duration,
) -> Arc<dyn DatabaseWriter> {
    if target.simulate_failure {
        let policy = FailurePolicy::from_config(target.failure_mode, simulation, index);
        tracing::info!(
            database_name = %target.name,
            mode = ?target.failure_mode,
            "Using simulated writer"
        );
        Arc::new(SimulatedWriter::new(&target.name, policy))
    } else {
        Arc::new(PostgresWriter::connect_lazy(target, write_timeout))
    }
}
