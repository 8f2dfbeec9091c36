//! Failure injection for targets that must not touch a real database.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{FailureMode, SimulationConfig};
use crate::writer::{DatabaseWriter, WriteError, WriteOutcome};

/// Outcome selection strategy, fixed at startup.
#[derive(Debug)]
pub enum FailurePolicy {
    AlwaysFailure,
    AlwaysTimeout,
    AlwaysSuccess,
    /// Success, failure, timeout, repeating from success.
    Cycle { next: AtomicUsize },
    /// Non-success with probability `rate`, split evenly between failure and timeout.
    Random { rate: f64, rng: Mutex<StdRng> },
}

impl FailurePolicy {
    pub fn from_config(mode: FailureMode, simulation: &SimulationConfig, index: usize) -> Self {
        match mode {
            FailureMode::Failure => FailurePolicy::AlwaysFailure,
            FailureMode::Timeout => FailurePolicy::AlwaysTimeout,
            FailureMode::Success => FailurePolicy::AlwaysSuccess,
            FailureMode::Cycle => FailurePolicy::cycle(),
            FailureMode::Random => {
                let rng = match simulation.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
                    None => StdRng::from_entropy(),
                };
                FailurePolicy::Random {
                    rate: simulation.rate,
                    rng: Mutex::new(rng),
                }
            }
        }
    }

    pub fn cycle() -> Self {
        FailurePolicy::Cycle {
            next: AtomicUsize::new(0),
        }
    }

    pub fn seeded(rate: f64, seed: u64) -> Self {
        FailurePolicy::Random {
            rate,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Pick the outcome of the next simulated write.
    pub fn next_outcome(&self, name: &str) -> WriteOutcome {
        match self {
            FailurePolicy::AlwaysFailure => simulated_failure(name),
            FailurePolicy::AlwaysTimeout => WriteOutcome::Timeout,
            FailurePolicy::AlwaysSuccess => WriteOutcome::Success,
            FailurePolicy::Cycle { next } => match next.fetch_add(1, Ordering::Relaxed) % 3 {
                0 => WriteOutcome::Success,
                1 => simulated_failure(name),
                _ => WriteOutcome::Timeout,
            },
            FailurePolicy::Random { rate, rng } => {
                let mut rng = rng.lock();
                if rng.gen::<f64>() >= *rate {
                    WriteOutcome::Success
                } else if rng.gen_bool(0.5) {
                    simulated_failure(name)
                } else {
                    WriteOutcome::Timeout
                }
            }
        }
    }
}

fn simulated_failure(name: &str) -> WriteOutcome {
    WriteOutcome::Failure(format!(
        "simulated database connection error for {}",
        name
    ))
}

/// Writer that answers from a `FailurePolicy` without any I/O.
pub struct SimulatedWriter {
    name: String,
    policy: FailurePolicy,
}

impl SimulatedWriter {
    pub fn new(name: &str, policy: FailurePolicy) -> Self {
        Self {
            name: name.to_string(),
            policy,
        }
    }
}

#[async_trait]
impl DatabaseWriter for SimulatedWriter {
    async fn write(&self) -> Result<(), WriteError> {
        match self.policy.next_outcome(&self.name) {
            WriteOutcome::Success => Ok(()),
            WriteOutcome::Failure(reason) => Err(WriteError::Simulated(reason)),
            WriteOutcome::Timeout => Err(WriteError::TimedOut),
        }
    }
}
