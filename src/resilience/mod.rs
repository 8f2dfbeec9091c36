//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Write attempt:
//!     → timeouts.rs (hard deadline T, enforced by the caller)
//!
//! Schema bootstrap:
//!     → timeouts.rs per attempt
//!     → backoff.rs between attempts (bounded, jittered)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every database call has a deadline
//! - Write cycles are never retried; the next tick is the retry
//! - Jittered backoff keeps many replicas from bootstrapping in lockstep

pub mod backoff;
pub mod timeouts;

pub use backoff::Backoff;
pub use timeouts::{bounded, DeadlineExceeded};
