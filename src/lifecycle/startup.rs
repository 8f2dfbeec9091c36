//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the metrics registry from a validated configuration
//! - Bind the exposition listener
//! - Start one reporter per target and the HTTP server
//! - Stop both on shutdown, in order
//!
//! # Design Decisions
//! - Fail fast: a bind error is fatal before any write happens
//! - Every series exists before the listener accepts a scrape
//! - A server error triggers shutdown so reporters never outlive it

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ReporterConfig;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::observability::MetricsRegistry;
use crate::reporter::{build_reporters, ReporterSet};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Server(#[from] std::io::Error),
}

/// The assembled reporter process.
pub struct Application {
    config: ReporterConfig,
    registry: Arc<MetricsRegistry>,
}

impl Application {
    pub fn new(config: ReporterConfig) -> Self {
        let registry = Arc::new(MetricsRegistry::from_config(&config));
        Self { config, registry }
    }

    pub fn registry(&self) -> Arc<MetricsRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Bind the configured listener address.
    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let address = &self.config.listener.bind_address;
        TcpListener::bind(address)
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })
    }

    /// Run until `shutdown` is triggered, then wait for every reporter to exit.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), StartupError> {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        tracing::info!(
            mode = ?self.config.mode,
            targets = ?self.config.target_names().collect::<Vec<_>>(),
            interval_secs = self.config.schedule.interval_secs,
            write_timeout_secs = self.config.schedule.write_timeout_secs,
            address = ?addr,
            "Starting reporter"
        );

        let reporters = ReporterSet::spawn(build_reporters(&self.config, &self.registry), shutdown);

        let state = AppState::new(self.registry.clone(), &self.config);
        let server = HttpServer::new(state, &self.config.listener);
        let result = server.run(listener, shutdown.subscribe()).await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "HTTP server failed, stopping reporters");
        }
        shutdown.trigger();

        tracing::info!(reporters = reporters.len(), "Waiting for reporters to finish");
        reporters.join().await;
        tracing::info!("Shutdown complete");

        result.map_err(StartupError::from)
    }
}
