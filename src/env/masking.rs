//! Action masking: which candidates each rollout may select next.
//!
//! Legality is kept as a boolean feasibility matrix on the [`RolloutState`];
//! the `-inf` bias seen by the policy is derived from it only when a
//! [`StepState`](super::state::StepState) snapshot is taken.
//!
//! Every rule runs over the whole batch with per-row boolean selections, so
//! repairs apply to each instance independently.

use super::config::FallbackRule;
use super::phase::{Phase, PhaseTemplate};
use super::state::RolloutState;
use super::types::DEPOT;

/// Per-step counts of the special-cased repairs, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskOutcome {
    /// Rollouts parked on their current node by a delivery dead end.
    pub stalled: usize,
    /// Rollouts given the depot because no pickup candidate was left.
    pub depot_forced: usize,
}

/// Applies phase-specific legality rules on top of the visited mask.
#[derive(Debug, Clone, Copy)]
pub struct MaskingEngine<'a> {
    /// Depot+node demands, `B × (N+1)`.
    demand: &'a [f64],
    template: &'a PhaseTemplate,
    epsilon: f64,
    fallback: FallbackRule,
}

impl<'a> MaskingEngine<'a> {
    /// Creates an engine over a batch's demand table.
    pub fn new(
        demand: &'a [f64],
        template: &'a PhaseTemplate,
        epsilon: f64,
        fallback: FallbackRule,
    ) -> Self {
        Self {
            demand,
            template,
            epsilon,
            fallback,
        }
    }

    /// Recomputes `state.feasible` for the given phase.
    ///
    /// Starts from the complement of the visited flags, applies the phase
    /// rule and its repair, and finally reopens the depot for finished
    /// rollouts so they always have a no-op action.
    pub fn apply(&self, state: &mut RolloutState, phase: Phase) -> MaskOutcome {
        for (cell, visited) in state.feasible.iter_mut().zip(&state.visited) {
            *cell = !*visited;
        }

        let outcome = match phase {
            Phase::Delivery => self.delivery(state),
            Phase::Pickup => self.pickup(state),
            Phase::Fallback => self.fallback(state),
        };

        self.unmask_finished_depot(state);
        outcome
    }

    /// Delivery sub-phase: delivery-type candidates whose demand fits.
    ///
    /// A rollout left without any legal candidate is stalled: its current
    /// node is reopened so it can stay in place, and the demand consumed by
    /// that re-selection is refunded on the next step.
    fn delivery(&self, state: &mut RolloutState) -> MaskOutcome {
        let eps = self.epsilon;
        let template = self.template;
        self.restrict(state, |load, demand, node| {
            load + eps < demand || !template.is_delivery(node)
        });

        let nc = state.node_count;
        let dead_end: Vec<bool> = state
            .feasible
            .chunks_exact(nc)
            .map(|row| !row.iter().any(|f| *f))
            .collect();

        for (r, stuck) in dead_end.iter().enumerate() {
            state.stalled[r] = *stuck;
            if *stuck {
                let here = state.current_node[r].unwrap_or(DEPOT);
                state.feasible[r * nc + here] = true;
            }
        }

        MaskOutcome {
            stalled: dead_end.iter().filter(|s| **s).count(),
            depot_forced: 0,
        }
    }

    /// Pickup sub-phase: pickup-type candidates with headroom and capacity.
    ///
    /// Rollouts with no legal customer left get the depot reopened.
    fn pickup(&self, state: &mut RolloutState) -> MaskOutcome {
        let eps = self.epsilon;
        let template = self.template;
        self.restrict(state, |load, demand, node| {
            load - 1.0 + eps > demand || !template.is_pickup(node) || load + eps < demand
        });
        state.stalled.fill(false);

        MaskOutcome {
            stalled: 0,
            depot_forced: self.force_depot_where_no_customer(state),
        }
    }

    /// Rule used once the scheduled blocks are exhausted.
    fn fallback(&self, state: &mut RolloutState) -> MaskOutcome {
        let eps = self.epsilon;
        match self.fallback {
            FallbackRule::Legacy => self.restrict(state, |load, demand, _| load - demand > 2.0),
            FallbackRule::Capacity => self.restrict(state, |load, demand, _| load + eps < demand),
        }
        state.stalled.fill(false);
        MaskOutcome::default()
    }

    /// Clears every candidate for which `illegal(load, demand, node)` holds.
    fn restrict<F>(&self, state: &mut RolloutState, illegal: F)
    where
        F: Fn(f64, f64, usize) -> bool,
    {
        let nc = state.node_count;
        let pomo = state.pomo_size;
        for (r, row) in state.feasible.chunks_exact_mut(nc).enumerate() {
            let load = state.load[r];
            let b = r / pomo;
            let demand = &self.demand[b * nc..(b + 1) * nc];
            for (node, (cell, d)) in row.iter_mut().zip(demand).enumerate() {
                if illegal(load, *d, node) {
                    *cell = false;
                }
            }
        }
    }

    fn force_depot_where_no_customer(&self, state: &mut RolloutState) -> usize {
        let nc = state.node_count;
        let mut forced = 0;
        for row in state.feasible.chunks_exact_mut(nc) {
            if !row[DEPOT + 1..].iter().any(|f| *f) {
                row[DEPOT] = true;
                forced += 1;
            }
        }
        forced
    }

    fn unmask_finished_depot(&self, state: &mut RolloutState) {
        let nc = state.node_count;
        for (row, finished) in state.feasible.chunks_exact_mut(nc).zip(&state.finished) {
            if *finished {
                row[DEPOT] = true;
            }
        }
    }
}
