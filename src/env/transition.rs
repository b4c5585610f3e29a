//! State transition applied for one batch of selected nodes.

use super::error::EnvError;
use super::state::RolloutState;
use super::types::DEPOT;

/// Applies selections to a [`RolloutState`].
///
/// Masking is not part of the transition; the environment runs the
/// [`MaskingEngine`](super::masking::MaskingEngine) between [`Transition::apply`]
/// and [`Transition::update_finished`].
pub struct Transition;

impl Transition {
    /// Checks that `selected` has one legal node per rollout.
    ///
    /// Runs before any mutation so a rejected step leaves the state untouched.
    pub fn validate(state: &RolloutState, selected: &[usize]) -> Result<(), EnvError> {
        if selected.len() != state.rollouts() {
            return Err(EnvError::ShapeMismatch {
                expected: state.rollouts(),
                actual: selected.len(),
            });
        }
        for (r, &node) in selected.iter().enumerate() {
            if node >= state.node_count {
                return Err(EnvError::NodeOutOfRange {
                    node,
                    node_count: state.node_count,
                });
            }
            if !state.feasible_row(r)[node] {
                return Err(EnvError::IllegalAction {
                    batch: r / state.pomo_size,
                    pomo: r % state.pomo_size,
                    node,
                });
            }
        }
        Ok(())
    }

    /// Records the selections and updates load and visitation.
    ///
    /// `demand` is the depot+node demand table, `B × (N+1)`. Rollouts that
    /// were stalled by the previous mask get the demand of this (forced)
    /// re-selection refunded.
    pub fn apply(state: &mut RolloutState, selected: &[usize], demand: &[f64]) {
        let nc = state.node_count;
        let pomo = state.pomo_size;

        state.selected_count += 1;
        for (r, &node) in selected.iter().enumerate() {
            state.current_node[r] = Some(node);
            state.selected_node_list[r].push(node);
            state.at_the_depot[r] = node == DEPOT;
        }

        let selected_demand: Vec<f64> = selected
            .iter()
            .enumerate()
            .map(|(r, &node)| demand[(r / pomo) * nc + node])
            .collect();

        for r in 0..state.rollouts() {
            state.load[r] -= selected_demand[r];
            if state.at_the_depot[r] {
                state.load[r] = 1.0;
            }
        }

        for (r, &node) in selected.iter().enumerate() {
            let row = &mut state.visited[r * nc..(r + 1) * nc];
            row[node] = true;
            row[DEPOT] = state.at_the_depot[r];
        }

        for ((load, stalled), consumed) in state
            .load
            .iter_mut()
            .zip(&state.stalled)
            .zip(&selected_demand)
        {
            if *stalled {
                *load += consumed;
            }
        }
    }

    /// Marks rollouts finished once every customer is visited.
    ///
    /// Returns the number of rollouts that finished on this step.
    pub fn update_finished(state: &mut RolloutState) -> usize {
        let mut newly = 0;
        for r in 0..state.rollouts() {
            if !state.finished[r] && state.all_customers_visited(r) {
                state.finished[r] = true;
                newly += 1;
            }
        }
        newly
    }
}
