//! Random policy for testing and baselines.

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;

use super::trait_::Policy;
use crate::env::state::StepState;
use crate::env::types::DEPOT;

/// Uniformly random selection among the legal candidates.
///
/// Each rollout independently draws one node whose mask entry is not `-inf`.
/// Used for sanity checks and as a lower-bound baseline.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    /// Creates a new random policy with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn select_actions(&mut self, state: &StepState) -> Vec<usize> {
        (0..state.rollouts())
            .map(|r| {
                state
                    .legal_nodes(r)
                    .choose(&mut self.rng)
                    .unwrap_or(DEPOT)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}
