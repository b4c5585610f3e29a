//! Evaluation metrics for the rollout environment.
//!
//! Runs whole episodes with a policy and aggregates tour lengths, including
//! the best-of-rollouts (and best-of-folds, when augmenting) score per
//! original instance.

use std::fmt;

use tracing::debug;

use super::environment::VrpbEnv;
use super::error::EnvError;
use super::policy::Policy;

/// Aggregated evaluation metrics over multiple episodes.
#[derive(Debug, Clone)]
pub struct EvaluationMetrics {
    /// Mean tour length over every rollout.
    pub mean_tour_length: f64,
    /// Mean over instances of the shortest tour among its rollouts and folds.
    pub mean_best_tour_length: f64,
    /// Mean number of steps until every rollout finished.
    pub mean_steps: f64,
    /// Number of episodes evaluated.
    pub n_episodes: usize,
    /// Instances per episode (before augmentation).
    pub batch_size: usize,
}

/// Per-episode statistics.
#[derive(Debug, Default)]
struct EpisodeStats {
    mean_tour_length: f64,
    mean_best_tour_length: f64,
    steps: usize,
}

impl EvaluationMetrics {
    /// Evaluates a policy over multiple episodes and returns aggregated metrics.
    ///
    /// # Arguments
    ///
    /// * `env` - The environment; each episode loads a fresh batch from its source
    /// * `policy` - The policy to evaluate
    /// * `n_episodes` - Number of episodes to run
    /// * `batch_size` - Instances per episode
    /// * `augmentation_factor` - 1, or 8 to score the best of the 8 folds
    pub fn evaluate(
        env: &mut VrpbEnv,
        policy: &mut dyn Policy,
        n_episodes: usize,
        batch_size: usize,
        augmentation_factor: usize,
    ) -> Result<Self, EnvError> {
        if n_episodes == 0 || batch_size == 0 {
            return Err(EnvError::InvalidConfig(format!(
                "evaluation needs episodes and instances, got {n_episodes} x {batch_size}"
            )));
        }
        let pomo = env.config().pomo_size;
        let mut all_stats = Vec::with_capacity(n_episodes);

        for episode in 0..n_episodes {
            env.load_problems(batch_size, augmentation_factor)?;
            let reset = env.reset()?;
            policy.on_reset(&reset.state);

            let mut result = env.pre_step()?;
            let reward = loop {
                let actions = policy.select_actions(&result.state);
                result = env.step(&actions)?;
                if let Some(reward) = result.reward.take() {
                    break reward;
                }
            };

            let mean_tour_length = -reward.iter().sum::<f64>() / reward.len() as f64;
            let mean_best_tour_length = (0..batch_size)
                .map(|i| {
                    let best = (0..augmentation_factor)
                        .flat_map(|fold| {
                            let row = (fold * batch_size + i) * pomo;
                            reward[row..row + pomo].iter().copied()
                        })
                        .fold(f64::NEG_INFINITY, f64::max);
                    -best
                })
                .sum::<f64>()
                / batch_size as f64;

            debug!(
                episode,
                policy = policy.name(),
                mean_tour_length,
                mean_best_tour_length,
                "episode finished"
            );
            all_stats.push(EpisodeStats {
                mean_tour_length,
                mean_best_tour_length,
                steps: result.state.selected_count,
            });
        }

        let n = all_stats.len() as f64;
        Ok(Self {
            mean_tour_length: all_stats.iter().map(|s| s.mean_tour_length).sum::<f64>() / n,
            mean_best_tour_length: all_stats
                .iter()
                .map(|s| s.mean_best_tour_length)
                .sum::<f64>()
                / n,
            mean_steps: all_stats.iter().map(|s| s.steps as f64).sum::<f64>() / n,
            n_episodes,
            batch_size,
        })
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Evaluation Metrics ({} episodes x {} instances) ===",
            self.n_episodes, self.batch_size
        )?;
        writeln!(f, "  Mean tour length:       {:.4}", self.mean_tour_length)?;
        writeln!(
            f,
            "  Mean best tour length:  {:.4}",
            self.mean_best_tour_length
        )?;
        writeln!(f, "  Mean steps:             {:.1}", self.mean_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{EnvConfig, NearestFeasiblePolicy, RandomPolicy};

    #[test]
    fn evaluate_completes() {
        let mut env = VrpbEnv::new(EnvConfig::new(8, 3)).unwrap();
        let mut policy = RandomPolicy::new(42);
        let metrics = EvaluationMetrics::evaluate(&mut env, &mut policy, 3, 2, 1).unwrap();
        assert_eq!(metrics.n_episodes, 3);
        assert!(metrics.mean_tour_length > 0.0);
        assert!(metrics.mean_best_tour_length <= metrics.mean_tour_length + 1e-12);
        assert!(metrics.mean_steps >= 8.0);
    }

    #[test]
    fn augmented_best_is_no_worse() {
        let config = EnvConfig::new(8, 3);
        let mut plain_env = VrpbEnv::new(config.clone()).unwrap();
        let mut aug_env = VrpbEnv::new(config).unwrap();
        let plain = EvaluationMetrics::evaluate(
            &mut plain_env,
            &mut NearestFeasiblePolicy::new(),
            1,
            4,
            1,
        )
        .unwrap();
        let augmented = EvaluationMetrics::evaluate(
            &mut aug_env,
            &mut NearestFeasiblePolicy::new(),
            1,
            4,
            8,
        )
        .unwrap();
        assert!(augmented.mean_best_tour_length <= plain.mean_best_tour_length + 1e-9);
    }

    #[test]
    fn empty_evaluation_rejected() {
        let mut env = VrpbEnv::new(EnvConfig::new(8, 3)).unwrap();
        let mut policy = RandomPolicy::new(1);
        for (episodes, batch) in [(0, 2), (2, 0)] {
            assert!(matches!(
                EvaluationMetrics::evaluate(&mut env, &mut policy, episodes, batch, 1),
                Err(EnvError::InvalidConfig(_))
            ));
        }
        assert!(env.batch_size().is_none());
    }

    #[test]
    fn display_lists_metrics() {
        let metrics = EvaluationMetrics {
            mean_tour_length: 5.0,
            mean_best_tour_length: 4.0,
            mean_steps: 12.0,
            n_episodes: 2,
            batch_size: 8,
        };
        let s = metrics.to_string();
        assert!(s.contains("2 episodes x 8 instances"));
        assert!(s.contains("5.0000"));
    }
}
