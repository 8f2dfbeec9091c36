//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the reporter.
//! Values are produced once by the loader and never mutated afterwards.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Default PostgreSQL port for targets that do not set one.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database user for targets that do not set one.
pub const DEFAULT_DB_USER: &str = "k8sadmin";

/// Default database name in multi-database mode.
pub const DEFAULT_DB_DBNAME: &str = "timestamp";

/// Default histogram upper bounds in seconds.
pub const DEFAULT_LATENCY_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Root configuration for the reporter.
#[derive(Debug, Clone, Serialize)]
pub struct ReporterConfig {
    /// How the targets were declared.
    pub mode: TargetMode,

    /// Databases to write to, in declaration order.
    pub targets: Vec<DatabaseTarget>,

    /// Write period and deadline.
    pub schedule: ScheduleConfig,

    /// Failure injection knobs shared by all simulated targets.
    pub simulation: SimulationConfig,

    /// Metric naming and histogram layout.
    pub metrics: MetricsConfig,

    /// HTTP exposition listener.
    pub listener: ListenerConfig,
}

impl ReporterConfig {
    /// Build a configuration around the given targets, using defaults elsewhere.
    pub fn with_targets(mode: TargetMode, targets: Vec<DatabaseTarget>) -> Self {
        Self {
            mode,
            targets,
            schedule: ScheduleConfig::default(),
            simulation: SimulationConfig::default(),
            metrics: MetricsConfig::for_mode(mode),
            listener: ListenerConfig::default(),
        }
    }

    /// Names of all configured targets, in declaration order.
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.name.as_str())
    }
}

/// Whether targets came from the single-database or multi-database variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    Single,
    Multi,
}

/// One logical database to write to.
#[derive(Clone, PartialEq, Serialize)]
pub struct DatabaseTarget {
    /// Value of the `database_name` label.
    pub name: String,

    pub host: String,

    pub port: u16,

    pub user: String,

    #[serde(skip_serializing)]
    pub password: String,

    /// Database name on the server.
    pub dbname: String,

    /// When set, writes are answered by `failure_mode` and never reach a server.
    pub simulate_failure: bool,

    /// Injection policy used when `simulate_failure` is set.
    pub failure_mode: FailureMode,
}

impl DatabaseTarget {
    /// A target that never contacts a server.
    pub fn simulated(name: impl Into<String>, failure_mode: FailureMode) -> Self {
        let name = name.into();
        Self {
            dbname: name.clone(),
            name,
            host: String::new(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            simulate_failure: true,
            failure_mode,
        }
    }
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("simulate_failure", &self.simulate_failure)
            .field("failure_mode", &self.failure_mode)
            .finish()
    }
}

/// Write scheduling.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleConfig {
    /// Seconds between the start of consecutive cycles for one target.
    pub interval_secs: f64,

    /// Hard upper bound on a single write attempt, in seconds.
    pub write_timeout_secs: f64,
}

/// Shortest interval or timeout the timer can honour.
pub const MIN_SCHEDULE_DURATION: Duration = Duration::from_millis(1);

/// Seconds as a schedulable `Duration`: finite, representable and at least
/// `MIN_SCHEDULE_DURATION`.
pub fn schedule_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| *d >= MIN_SCHEDULE_DURATION)
}

impl ScheduleConfig {
    /// Validated configurations always convert; anything else gets the default.
    pub fn interval(&self) -> Duration {
        schedule_duration(self.interval_secs).unwrap_or(DEFAULT_SCHEDULE_DURATION)
    }

    pub fn write_timeout(&self) -> Duration {
        schedule_duration(self.write_timeout_secs).unwrap_or(DEFAULT_SCHEDULE_DURATION)
    }
}

const DEFAULT_SCHEDULE_DURATION: Duration = Duration::from_secs(5);

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SCHEDULE_DURATION.as_secs_f64(),
            write_timeout_secs: DEFAULT_SCHEDULE_DURATION.as_secs_f64(),
        }
    }
}

/// Outcome selection strategy for simulated targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Every write fails.
    Failure,
    /// Every write times out.
    Timeout,
    /// Every write succeeds.
    Success,
    /// Success, failure, timeout, repeating.
    Cycle,
    /// Non-success with probability `SimulationConfig::rate`.
    Random,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "failure" => Ok(FailureMode::Failure),
            "timeout" => Ok(FailureMode::Timeout),
            "success" => Ok(FailureMode::Success),
            "cycle" | "round-robin" => Ok(FailureMode::Cycle),
            "random" => Ok(FailureMode::Random),
            other => Err(format!(
                "unknown mode '{}', expected failure, timeout, success, cycle or random",
                other
            )),
        }
    }
}

/// Failure injection settings.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationConfig {
    /// Policy for simulated targets without their own override.
    pub mode: FailureMode,

    /// Probability of a non-success outcome in random mode.
    pub rate: f64,

    /// Seed for random mode. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: FailureMode::Failure,
            rate: 0.5,
            seed: None,
        }
    }
}

/// Metric naming and histogram layout.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsConfig {
    /// Prepended to every metric name with an underscore. Empty means none.
    pub prefix: String,

    /// Finite histogram upper bounds in seconds, strictly ascending.
    pub latency_buckets: Vec<f64>,
}

impl MetricsConfig {
    pub fn for_mode(mode: TargetMode) -> Self {
        let prefix = match mode {
            TargetMode::Single => "db",
            TargetMode::Multi => "multidb",
        };
        Self {
            prefix: prefix.to_string(),
            latency_buckets: DEFAULT_LATENCY_BUCKETS.to_vec(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Per-request timeout for the HTTP server, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 10,
        }
    }
}
