//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Registry → Bind → Reporters + HTTP server
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Reporters finish their current cycle → Server drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::{shutdown_signal, spawn_signal_listener};
pub use startup::{Application, StartupError};
