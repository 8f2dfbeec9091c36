//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use db_write_reporter::config::{DatabaseTarget, FailureMode, ReporterConfig, TargetMode};
use db_write_reporter::lifecycle::{Application, Shutdown, StartupError};
use db_write_reporter::MetricsRegistry;
use tokio::task::JoinHandle;

/// A reporter running on a loopback port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub registry: Arc<MetricsRegistry>,
    handle: JoinHandle<Result<(), StartupError>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(self.url(path))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .unwrap()
    }

    pub async fn scrape(&self) -> String {
        self.get("/metrics").await.text().await.unwrap()
    }

    /// Trigger shutdown and wait for the application to return.
    pub async fn stop(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("application did not stop in time")
            .expect("application task panicked")
    }
}

/// Simulated targets only; nothing reaches a real database.
pub fn simulated_config(
    mode: TargetMode,
    targets: &[(&str, FailureMode)],
    interval_secs: f64,
) -> ReporterConfig {
    let targets = targets
        .iter()
        .map(|(name, mode)| DatabaseTarget::simulated(*name, *mode))
        .collect();
    let mut config = ReporterConfig::with_targets(mode, targets);
    config.schedule.interval_secs = interval_secs;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

pub async fn spawn_app(config: ReporterConfig) -> TestApp {
    let app = Application::new(config);
    let registry = app.registry();
    let listener = app.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { app.run(listener, &shutdown).await })
    };

    TestApp {
        addr,
        shutdown,
        registry,
        handle,
    }
}

/// Value of the sample whose line starts with `series` (name plus labels).
pub fn metric_value(body: &str, series: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (key, value) = line.rsplit_once(' ')?;
            if key == series {
                value.parse().ok()
            } else {
                None
            }
        })
}

/// Poll until `check` holds or `limit` passes.
pub async fn wait_until<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
