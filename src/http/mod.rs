//! HTTP exposition subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → handlers.rs
//!         /metrics → MetricsRegistry::render()
//!         /health  → per-target summary (JSON)
//!         /        → banner
//! ```
//!
//! Handlers only read the registry. Nothing served here changes a value.

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer, TargetInfo};
