//! Nearest-feasible heuristic policy.
//!
//! Greedily moves every rollout to the closest legal customer, falling back
//! to the depot only when no customer is legal.

use super::trait_::Policy;
use crate::env::state::{ResetState, StepState};
use crate::env::types::{Position, DEPOT};

/// Greedy nearest-neighbour baseline.
///
/// Before the first step every rollout spreads out: rollout `p` starts at
/// customer `p + 1` when that node is legal, mirroring the multi-start
/// convention of giving each rollout a distinct first customer.
#[derive(Debug, Default)]
pub struct NearestFeasiblePolicy {
    /// Depot+node coordinates, `B × (N+1)`.
    xy: Vec<Position>,
    node_count: usize,
}

impl NearestFeasiblePolicy {
    /// Creates a policy; geometry is taken from each reset.
    pub fn new() -> Self {
        Self::default()
    }

    fn nearest(&self, state: &StepState, rollout: usize) -> usize {
        let b = rollout / state.pomo_size;
        let row = &self.xy[b * self.node_count..(b + 1) * self.node_count];
        let here = row[state.current_node[rollout].unwrap_or(DEPOT)];
        state
            .legal_nodes(rollout)
            .filter(|&j| j != DEPOT)
            .min_by(|&a, &c| here.distance_to(&row[a]).total_cmp(&here.distance_to(&row[c])))
            .unwrap_or(DEPOT)
    }
}

impl Policy for NearestFeasiblePolicy {
    fn on_reset(&mut self, reset: &ResetState) {
        self.node_count = reset.problem_size + 1;
        self.xy = (0..reset.batch_size)
            .flat_map(|b| reset.depot_node_xy(b))
            .collect();
    }

    fn select_actions(&mut self, state: &StepState) -> Vec<usize> {
        (0..state.rollouts())
            .map(|r| {
                let start = r % state.pomo_size + 1;
                if state.selected_count == 0 && state.is_legal(r, start) {
                    start
                } else {
                    self.nearest(state, r)
                }
            })
            .collect()
    }

    fn name(&self) -> &str {
        "nearest_feasible"
    }
}
