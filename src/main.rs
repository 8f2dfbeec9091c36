use std::process::ExitCode;

use clap::Parser;

use db_write_reporter::config::{load_from_env, ConfigError};
use db_write_reporter::lifecycle::{spawn_signal_listener, Application, Shutdown};
use db_write_reporter::observability::logging::{self, LogFormat};

/// Periodic database write reporter with Prometheus metrics.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Override the metrics listener address (METRICS_BIND_ADDRESS).
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Validate the environment, print the resolved configuration and exit.
    #[arg(long)]
    check_config: bool,
}

const EXIT_RUNTIME_ERROR: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(LogFormat::from_env());

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "db-write-reporter starting");

    let mut config = match load_from_env() {
        Ok(config) => config,
        Err(e) => return config_failure(&e),
    };

    if let Some(bind) = cli.bind {
        if let Err(e) = bind.parse::<std::net::SocketAddr>() {
            tracing::error!(address = %bind, error = %e, "Invalid --bind address");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
        config.listener.bind_address = bind;
    }

    if cli.check_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to render configuration");
                ExitCode::from(EXIT_RUNTIME_ERROR)
            }
        };
    }

    let app = Application::new(config);
    let listener = match app.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    match app.run(listener, &shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Reporter stopped with an error");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn config_failure(error: &ConfigError) -> ExitCode {
    for problem in error.errors() {
        tracing::error!(problem = %problem, "Configuration error");
    }
    eprintln!("{}", error);
    ExitCode::from(EXIT_CONFIG_ERROR)
}
