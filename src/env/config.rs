//! Configuration for the rollout environment.

use super::error::EnvError;

/// Masking rule applied once the scheduled delivery/pickup blocks run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackRule {
    /// Only visited nodes and candidates with `load - demand > 2` are masked.
    ///
    /// The threshold never binds for a unit-capacity vehicle; kept so that
    /// policies trained against the historical environment see the same masks.
    #[default]
    Legacy,
    /// Plain capacity check (`load + ε < demand`) without phase distinction.
    Capacity,
}

/// Configuration for the rollout environment.
///
/// Controls problem dimensions, the rollout width and the masking tolerances.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Number of customer nodes N (the depot is extra).
    pub problem_size: usize,
    /// Number of parallel rollouts P per instance.
    pub pomo_size: usize,
    /// Tolerance absorbing rounding at the capacity boundary.
    pub round_error_epsilon: f64,
    /// Rule used after step P².
    pub fallback: FallbackRule,
    /// Seed for the default random problem source.
    pub seed: u64,
}

impl EnvConfig {
    /// Creates a configuration with default tolerances.
    pub fn new(problem_size: usize, pomo_size: usize) -> Self {
        Self {
            problem_size,
            pomo_size,
            ..Self::default()
        }
    }

    /// Number of addressable locations (depot + customers).
    pub fn node_count(&self) -> usize {
        self.problem_size + 1
    }

    /// Checks dimensional consistency.
    ///
    /// The phase template assigns the first P customers to delivery, so the
    /// rollout width cannot exceed the number of customers.
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.problem_size == 0 {
            return Err(EnvError::InvalidConfig(
                "problem_size must be positive".into(),
            ));
        }
        if self.pomo_size == 0 {
            return Err(EnvError::InvalidConfig("pomo_size must be positive".into()));
        }
        if self.pomo_size > self.problem_size {
            return Err(EnvError::InvalidConfig(format!(
                "pomo_size {} exceeds problem_size {}",
                self.pomo_size, self.problem_size
            )));
        }
        if self.round_error_epsilon.is_nan() || self.round_error_epsilon < 0.0 {
            return Err(EnvError::InvalidConfig(
                "round_error_epsilon must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            problem_size: 20,
            pomo_size: 10,
            round_error_epsilon: 1e-5,
            fallback: FallbackRule::Legacy,
            seed: 1234,
        }
    }
}
