//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the exposition handlers
//! - Wire up middleware (tracing, request ID, timeout)
//! - Serve on a bound listener until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ListenerConfig, ReporterConfig};
use crate::http::handlers;
use crate::lifecycle::ShutdownListener;
use crate::observability::MetricsRegistry;

/// Static facts about a target, shown on `/health`.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub name: String,
    pub simulated: bool,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricsRegistry>,
    pub targets: Arc<[TargetInfo]>,
}

impl AppState {
    pub fn new(registry: Arc<MetricsRegistry>, config: &ReporterConfig) -> Self {
        let targets: Vec<TargetInfo> = config
            .targets
            .iter()
            .map(|t| TargetInfo {
                name: t.name.clone(),
                simulated: t.simulate_failure,
            })
            .collect();
        Self {
            registry,
            targets: targets.into(),
        }
    }
}

/// HTTP server for the metrics endpoint.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, listener: &ListenerConfig) -> Self {
        let router = Self::build_router(state, Duration::from_secs(listener.request_timeout_secs));
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/", get(handlers::index))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// The router, for serving or for driving requests directly.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain open requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
