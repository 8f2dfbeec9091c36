//! Configuration validation.
//!
//! Semantic checks run after the loader has turned raw variables into typed
//! values. Every problem is reported, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{schedule_duration, ReporterConfig, MIN_SCHEDULE_DURATION};

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required variable {var} for database '{target}'")]
    MissingVariable { var: String, target: String },

    #[error("{var}={value:?} is invalid: {reason}")]
    Malformed {
        var: String,
        value: String,
        reason: String,
    },

    #[error("DATABASE_NAMES is set but lists no databases")]
    EmptyTargetList,

    #[error("no database targets configured")]
    NoTargets,

    #[error("database name '{0}' may only contain ASCII letters, digits, '_' and '-'")]
    InvalidTargetName(String),

    #[error("database name '{0}' is listed more than once")]
    DuplicateTarget(String),

    #[error("{field} {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Check a fully built configuration.
pub fn validate_config(config: &ReporterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.targets.is_empty() {
        errors.push(ValidationError::NoTargets);
    }

    let mut seen = HashSet::new();
    for target in &config.targets {
        if !is_valid_target_name(&target.name) {
            errors.push(ValidationError::InvalidTargetName(target.name.clone()));
        }
        if !seen.insert(target.name.as_str()) {
            errors.push(ValidationError::DuplicateTarget(target.name.clone()));
        }
    }

    check_duration("write interval", config.schedule.interval_secs, &mut errors);
    check_duration("write timeout", config.schedule.write_timeout_secs, &mut errors);

    let rate = config.simulation.rate;
    if !(0.0..=1.0).contains(&rate) {
        errors.push(ValidationError::OutOfRange {
            field: "simulated failure rate",
            reason: format!("must be between 0 and 1, got {}", rate),
        });
    }

    if let Err(reason) = check_buckets(&config.metrics.latency_buckets) {
        errors.push(ValidationError::OutOfRange {
            field: "latency buckets",
            reason,
        });
    }

    if !config.metrics.prefix.is_empty() && !is_valid_metric_prefix(&config.metrics.prefix) {
        errors.push(ValidationError::OutOfRange {
            field: "metrics prefix",
            reason: format!(
                "'{}' must match [a-zA-Z_:][a-zA-Z0-9_:]*",
                config.metrics.prefix
            ),
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::OutOfRange {
            field: "bind address",
            reason: format!("'{}' is not a socket address", config.listener.bind_address),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Target names become label values and environment prefixes.
pub fn is_valid_target_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_valid_metric_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn check_duration(field: &'static str, value: f64, errors: &mut Vec<ValidationError>) {
    if schedule_duration(value).is_none() {
        errors.push(ValidationError::OutOfRange {
            field,
            reason: format!(
                "must be a finite number of seconds, at least {}, got {}",
                MIN_SCHEDULE_DURATION.as_secs_f64(),
                value
            ),
        });
    }
}

fn check_buckets(bounds: &[f64]) -> Result<(), String> {
    if bounds.is_empty() {
        return Err("must list at least one upper bound".to_string());
    }
    if let Some(bad) = bounds.iter().find(|b| !b.is_finite() || **b <= 0.0) {
        return Err(format!("bound {} is not a positive finite number", bad));
    }
    if let Some(pair) = bounds.windows(2).find(|w| w[0] >= w[1]) {
        return Err(format!(
            "bounds must be strictly ascending, {} is followed by {}",
            pair[0], pair[1]
        ));
    }
    Ok(())
}
