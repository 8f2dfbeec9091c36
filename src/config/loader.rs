//! Configuration loading from the process environment.

use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{
    DatabaseTarget, FailureMode, ListenerConfig, MetricsConfig, ReporterConfig, ScheduleConfig,
    SimulationConfig, TargetMode, DEFAULT_DB_DBNAME, DEFAULT_DB_PORT, DEFAULT_DB_USER,
};
use crate::config::validation::{is_valid_target_name, validate_config, ValidationError};

/// Comma separated list of logical database names; enables multi-database mode.
pub const DATABASE_NAMES: &str = "DATABASE_NAMES";

/// Every problem found while loading, in discovery order.
#[derive(Debug, Error)]
#[error("invalid configuration: {}", display_list(.errors))]
pub struct ConfigError {
    errors: Vec<ValidationError>,
}

impl ConfigError {
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }
}

fn display_list(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load and validate configuration from the process environment.
pub fn load_from_env() -> Result<ReporterConfig, ConfigError> {
    load_config(|key| std::env::var(key).ok())
}

/// Load and validate configuration from an arbitrary variable lookup.
pub fn load_config<F>(lookup: F) -> Result<ReporterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = Env {
        lookup,
        errors: Vec::new(),
    };

    let simulation = SimulationConfig {
        mode: env.parsed("SIMULATE_DB_FAILURE_MODE", FailureMode::Failure),
        rate: env.parsed("SIMULATE_DB_FAILURE_RATE", 0.5),
        seed: env.parsed_opt("SIMULATE_DB_FAILURE_SEED"),
    };
    let simulate_all = env.flag("SIMULATE_DB_FAILURE").unwrap_or(false);

    let (mode, targets) = match env.optional(DATABASE_NAMES) {
        Some(list) => (
            TargetMode::Multi,
            multi_targets(&mut env, &list, simulate_all, simulation.mode),
        ),
        None if env.raw(DATABASE_NAMES).is_some() => {
            env.errors.push(ValidationError::EmptyTargetList);
            (TargetMode::Multi, Vec::new())
        }
        None => (
            TargetMode::Single,
            single_target(&mut env, simulate_all, simulation.mode)
                .into_iter()
                .collect(),
        ),
    };

    let defaults = ScheduleConfig::default();
    let schedule = ScheduleConfig {
        interval_secs: env.parsed("DB_WRITE_INTERVAL_SECONDS", defaults.interval_secs),
        write_timeout_secs: env.parsed("DB_WRITE_TIMEOUT_SECONDS", defaults.write_timeout_secs),
    };

    let mut metrics = MetricsConfig::for_mode(mode);
    if let Some(prefix) = env.raw("METRICS_PREFIX") {
        metrics.prefix = prefix.trim().to_string();
    }
    if let Some(buckets) = env.optional("DB_WRITE_LATENCY_BUCKETS") {
        match parse_buckets(&buckets) {
            Ok(bounds) => metrics.latency_buckets = bounds,
            Err(reason) => env.malformed("DB_WRITE_LATENCY_BUCKETS", &buckets, reason),
        }
    }

    let mut listener = ListenerConfig::default();
    if let Some(addr) = env.optional("METRICS_BIND_ADDRESS") {
        listener.bind_address = addr;
    }

    let config = ReporterConfig {
        mode,
        targets,
        schedule,
        simulation,
        metrics,
        listener,
    };

    let mut errors = env.errors;
    if let Err(found) = validate_config(&config) {
        // Problems already reported by the loader would repeat here.
        let known = errors.len();
        for error in found {
            let explained = error == ValidationError::NoTargets && known > 0;
            if !explained && !errors[..known].contains(&error) {
                errors.push(error);
            }
        }
    }

    if errors.is_empty() {
        tracing::debug!(targets = config.targets.len(), mode = ?config.mode, "Configuration parsed");
        Ok(config)
    } else {
        Err(ConfigError { errors })
    }
}

/// Environment prefix for a logical database name: `analytics-eu` reads `ANALYTICS_EU_*`.
pub fn env_prefix(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

fn single_target<F>(
    env: &mut Env<F>,
    simulate_all: bool,
    failure_mode: FailureMode,
) -> Option<DatabaseTarget>
where
    F: Fn(&str) -> Option<String>,
{
    let name = match env.optional("DB_NAME") {
        Some(name) => name,
        None => {
            env.errors.push(ValidationError::MissingVariable {
                var: "DB_NAME".to_string(),
                target: "single-database mode".to_string(),
            });
            return None;
        }
    };

    let required = !simulate_all;
    Some(DatabaseTarget {
        host: env.connection_param("DB_HOST", &name, required),
        port: env.parsed("DB_PORT", DEFAULT_DB_PORT),
        user: env
            .optional("DB_USER")
            .unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
        password: env.connection_param("DB_PASSWORD", &name, required),
        dbname: name.clone(),
        name,
        simulate_failure: simulate_all,
        failure_mode,
    })
}

fn multi_targets<F>(
    env: &mut Env<F>,
    list: &str,
    simulate_all: bool,
    default_mode: FailureMode,
) -> Vec<DatabaseTarget>
where
    F: Fn(&str) -> Option<String>,
{
    let names: Vec<&str> = list
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();

    if names.is_empty() {
        env.errors.push(ValidationError::EmptyTargetList);
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(names.len());

    for name in names {
        if !is_valid_target_name(name) {
            env.errors
                .push(ValidationError::InvalidTargetName(name.to_string()));
            continue;
        }
        if !seen.insert(name) {
            env.errors
                .push(ValidationError::DuplicateTarget(name.to_string()));
            continue;
        }

        let prefix = env_prefix(name);
        let var = |suffix: &str| format!("{}_{}", prefix, suffix);

        let simulate_failure = env
            .flag(&var("SIMULATE_DB_FAILURE"))
            .unwrap_or(simulate_all);
        let failure_mode = env.parsed(&var("SIMULATE_DB_FAILURE_MODE"), default_mode);
        let required = !simulate_failure;

        targets.push(DatabaseTarget {
            name: name.to_string(),
            host: env.connection_param(&var("DB_HOST"), name, required),
            port: env.parsed(&var("DB_PORT"), DEFAULT_DB_PORT),
            user: env
                .optional(&var("DB_USER"))
                .unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            password: env.connection_param(&var("DB_PASSWORD"), name, required),
            dbname: env
                .optional(&var("DB_DBNAME"))
                .unwrap_or_else(|| DEFAULT_DB_DBNAME.to_string()),
            simulate_failure,
            failure_mode,
        });

        tracing::debug!(database_name = %name, simulate_failure, "Loaded database target");
    }

    targets
}

fn parse_buckets(raw: &str) -> Result<Vec<f64>, String> {
    let mut bounds = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if item.eq_ignore_ascii_case("+inf") || item.eq_ignore_ascii_case("inf") {
            // The +Inf bucket is always rendered.
            continue;
        }
        let bound: f64 = item
            .parse()
            .map_err(|_| format!("'{}' is not a number", item))?;
        bounds.push(bound);
    }
    Ok(bounds)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Variable lookup that accumulates problems instead of stopping at the first.
struct Env<F> {
    lookup: F,
    errors: Vec<ValidationError>,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// The value exactly as set, including empty strings.
    fn raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
    }

    /// The trimmed value; unset and blank are the same.
    fn optional(&self, var: &str) -> Option<String> {
        self.raw(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn connection_param(&mut self, var: &str, target: &str, required: bool) -> String {
        match self.optional(var) {
            Some(value) => value,
            None => {
                if required {
                    self.errors.push(ValidationError::MissingVariable {
                        var: var.to_string(),
                        target: target.to_string(),
                    });
                }
                String::new()
            }
        }
    }

    fn parsed<T>(&mut self, var: &str, default: T) -> T
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parsed_opt(var).unwrap_or(default)
    }

    fn parsed_opt<T>(&mut self, var: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.optional(var)?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.malformed(var, &value, e.to_string());
                None
            }
        }
    }

    fn flag(&mut self, var: &str) -> Option<bool> {
        let value = self.optional(var)?;
        let parsed = parse_flag(&value);
        if parsed.is_none() {
            self.malformed(var, &value, "expected true or false".to_string());
        }
        parsed
    }

    fn malformed(&mut self, var: &str, value: &str, reason: String) {
        self.errors.push(ValidationError::Malformed {
            var: var.to_string(),
            value: value.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ReporterConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_config(|key| map.get(key).cloned())
    }

    #[test]
    fn test_single_database_mode() {
        let config = load(&[
            ("DB_NAME", "orders"),
            ("DB_HOST", "db.svc"),
            ("DB_PORT", "6543"),
            ("DB_USER", "writer"),
            ("DB_PASSWORD", "secret"),
            ("DB_WRITE_INTERVAL_SECONDS", "2"),
        ])
        .unwrap();

        assert_eq!(config.mode, TargetMode::Single);
        assert_eq!(config.targets.len(), 1);
        let target = &config.targets[0];
        assert_eq!(target.name, "orders");
        assert_eq!(target.dbname, "orders");
        assert_eq!(target.host, "db.svc");
        assert_eq!(target.port, 6543);
        assert_eq!(target.user, "writer");
        assert!(!target.simulate_failure);
        assert_eq!(config.schedule.interval_secs, 2.0);
        assert_eq!(config.schedule.write_timeout_secs, 5.0);
        assert_eq!(config.metrics.prefix, "db");
    }

    #[test]
    fn test_multi_database_mode_defaults() {
        let config = load(&[
            ("DATABASE_NAMES", " prod, analytics-eu ,,"),
            ("PROD_DB_HOST", "prod.svc"),
            ("PROD_DB_PASSWORD", "p"),
            ("ANALYTICS_EU_DB_HOST", "analytics.svc"),
            ("ANALYTICS_EU_DB_PASSWORD", "a"),
            ("ANALYTICS_EU_DB_DBNAME", "events"),
        ])
        .unwrap();

        assert_eq!(config.mode, TargetMode::Multi);
        assert_eq!(config.metrics.prefix, "multidb");
        let names: Vec<_> = config.target_names().collect();
        assert_eq!(names, vec!["prod", "analytics-eu"]);

        let prod = &config.targets[0];
        assert_eq!(prod.port, DEFAULT_DB_PORT);
        assert_eq!(prod.user, DEFAULT_DB_USER);
        assert_eq!(prod.dbname, DEFAULT_DB_DBNAME);
        assert_eq!(config.targets[1].dbname, "events");
    }

    #[test]
    fn test_missing_required_variables_are_all_reported() {
        let err = load(&[("DATABASE_NAMES", "prod,analytics"), ("PROD_DB_HOST", "h")]).unwrap_err();

        let missing: Vec<_> = err
            .errors()
            .iter()
            .filter_map(|e| match e {
                ValidationError::MissingVariable { var, .. } => Some(var.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            missing,
            vec!["PROD_DB_PASSWORD", "ANALYTICS_DB_HOST", "ANALYTICS_DB_PASSWORD"]
        );
        assert!(err.to_string().contains("ANALYTICS_DB_HOST"));
    }

    #[test]
    fn test_simulated_targets_need_no_connection() {
        let config = load(&[
            ("DATABASE_NAMES", "prod,analytics"),
            ("SIMULATE_DB_FAILURE", "TRUE"),
            ("SIMULATE_DB_FAILURE_MODE", "timeout"),
            ("PROD_SIMULATE_DB_FAILURE_MODE", "success"),
        ])
        .unwrap();

        assert!(config.targets.iter().all(|t| t.simulate_failure));
        assert_eq!(config.targets[0].failure_mode, FailureMode::Success);
        assert_eq!(config.targets[1].failure_mode, FailureMode::Timeout);
    }

    #[test]
    fn test_per_target_simulation_override() {
        let config = load(&[
            ("DATABASE_NAMES", "prod,analytics"),
            ("PROD_DB_HOST", "h"),
            ("PROD_DB_PASSWORD", "p"),
            ("ANALYTICS_SIMULATE_DB_FAILURE", "true"),
        ])
        .unwrap();

        assert!(!config.targets[0].simulate_failure);
        assert!(config.targets[1].simulate_failure);
    }

    #[test]
    fn test_empty_and_duplicate_target_lists() {
        let err = load(&[("DATABASE_NAMES", " , ")]).unwrap_err();
        assert_eq!(err.errors(), &[ValidationError::EmptyTargetList]);

        let err = load(&[("DATABASE_NAMES", "")]).unwrap_err();
        assert_eq!(err.errors(), &[ValidationError::EmptyTargetList]);

        let err = load(&[
            ("DATABASE_NAMES", "a,a"),
            ("SIMULATE_DB_FAILURE", "true"),
        ])
        .unwrap_err();
        assert_eq!(err.errors(), &[ValidationError::DuplicateTarget("a".into())]);
    }

    #[test]
    fn test_invalid_interval_is_fatal() {
        for bad in ["0", "-3", "soon"] {
            let result = load(&[
                ("DB_NAME", "x"),
                ("SIMULATE_DB_FAILURE", "true"),
                ("DB_WRITE_INTERVAL_SECONDS", bad),
            ]);
            assert!(result.is_err(), "interval {:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_unschedulable_durations_are_rejected() {
        for var in ["DB_WRITE_INTERVAL_SECONDS", "DB_WRITE_TIMEOUT_SECONDS"] {
            for bad in ["0.0000000001", "1e30", "inf"] {
                let err = load(&[("DB_NAME", "x"), ("SIMULATE_DB_FAILURE", "true"), (var, bad)])
                    .unwrap_err();
                assert!(
                    err.errors()
                        .iter()
                        .any(|e| matches!(e, ValidationError::OutOfRange { .. })),
                    "{}={} should be out of range, got {:?}",
                    var,
                    bad,
                    err.errors()
                );
            }
        }
    }

    #[test]
    fn test_fractional_interval_converts() {
        let config = load(&[
            ("DB_NAME", "x"),
            ("SIMULATE_DB_FAILURE", "true"),
            ("DB_WRITE_INTERVAL_SECONDS", "0.25"),
        ])
        .unwrap();
        assert_eq!(config.schedule.interval(), std::time::Duration::from_millis(250));
        assert_eq!(config.schedule.write_timeout(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_bucket_parsing() {
        let config = load(&[
            ("DB_NAME", "x"),
            ("SIMULATE_DB_FAILURE", "true"),
            ("DB_WRITE_LATENCY_BUCKETS", "0.1, 0.5,1,+Inf"),
        ])
        .unwrap();
        assert_eq!(config.metrics.latency_buckets, vec![0.1, 0.5, 1.0]);

        let err = load(&[
            ("DB_NAME", "x"),
            ("SIMULATE_DB_FAILURE", "true"),
            ("DB_WRITE_LATENCY_BUCKETS", "0.1,fast"),
        ])
        .unwrap_err();
        assert!(matches!(
            &err.errors()[0],
            ValidationError::Malformed { var, .. } if var == "DB_WRITE_LATENCY_BUCKETS"
        ));
    }

    #[test]
    fn test_empty_prefix_is_kept() {
        let config = load(&[
            ("DB_NAME", "x"),
            ("SIMULATE_DB_FAILURE", "true"),
            ("METRICS_PREFIX", ""),
        ])
        .unwrap();
        assert_eq!(config.metrics.prefix, "");
    }

    #[test]
    fn test_missing_db_name() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(
            &err.errors()[0],
            ValidationError::MissingVariable { var, .. } if var == "DB_NAME"
        ));
    }

    #[test]
    fn test_password_never_serialized() {
        let config = load(&[
            ("DB_NAME", "x"),
            ("DB_HOST", "h"),
            ("DB_PASSWORD", "hunter2"),
        ])
        .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
