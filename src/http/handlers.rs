//! Request handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::exposition::CONTENT_TYPE;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub targets: Vec<TargetStatus>,
}

#[derive(Debug, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub simulated: bool,
    pub cycles: u64,
    pub last_outcome: Option<&'static str>,
}

/// Text exposition of every series. Reading it never changes a value.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE)],
        state.registry.render(),
    )
}

/// Liveness, with a per-target summary.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let targets = state
        .targets
        .iter()
        .map(|info| {
            let series = state.registry.series(&info.name);
            TargetStatus {
                name: info.name.clone(),
                simulated: info.simulated,
                cycles: series.as_ref().map_or(0, |s| s.cycles()),
                last_outcome: series
                    .as_ref()
                    .and_then(|s| s.last_outcome())
                    .map(|k| k.as_str()),
            }
        })
        .collect();

    Json(HealthStatus {
        status: "ok",
        targets,
    })
}

/// Plain text banner naming the configured targets.
pub async fn index(State(state): State<AppState>) -> String {
    let names: Vec<&str> = state.targets.iter().map(|t| t.name.as_str()).collect();
    format!(
        "db-write-reporter {}\ntargets: {}\nmetrics: /metrics\nhealth: /health\n",
        env!("CARGO_PKG_VERSION"),
        names.join(", ")
    )
}
