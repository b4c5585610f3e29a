//! Dynamic rollout state and the snapshots handed to the policy.
//!
//! [`RolloutState`] owns every per-rollout array mutated by a step. Rollout
//! `r = b * P + p` addresses instance `b`, rollout `p`; per-candidate arrays
//! are laid out `(r, j)` with `N + 1` candidates per row.

use super::phase::PhaseTemplate;
use super::problem::ProblemBatch;
use super::types::{Position, DEPOT};

/// Mutable state of all `B × P` rollouts.
#[derive(Debug, Clone)]
pub struct RolloutState {
    pub(crate) batch_size: usize,
    pub(crate) pomo_size: usize,
    pub(crate) node_count: usize,
    /// Steps taken so far.
    pub(crate) selected_count: usize,
    /// Last selected node, `None` before the first step.
    pub(crate) current_node: Vec<Option<usize>>,
    /// Per-rollout ordered history of selected nodes.
    pub(crate) selected_node_list: Vec<Vec<usize>>,
    pub(crate) at_the_depot: Vec<bool>,
    pub(crate) load: Vec<f64>,
    /// Permanent visitation, `(r, j)`; the depot entry tracks occupancy.
    pub(crate) visited: Vec<bool>,
    /// Legal next selections, `(r, j)`.
    pub(crate) feasible: Vec<bool>,
    pub(crate) finished: Vec<bool>,
    /// Rollouts parked on their current node by a delivery dead end.
    pub(crate) stalled: Vec<bool>,
}

impl RolloutState {
    /// Fresh state: full loads, nothing visited, every candidate legal.
    pub fn new(batch_size: usize, pomo_size: usize, node_count: usize) -> Self {
        let rollouts = batch_size * pomo_size;
        Self {
            batch_size,
            pomo_size,
            node_count,
            selected_count: 0,
            current_node: vec![None; rollouts],
            selected_node_list: vec![Vec::new(); rollouts],
            at_the_depot: vec![true; rollouts],
            load: vec![1.0; rollouts],
            visited: vec![false; rollouts * node_count],
            feasible: vec![true; rollouts * node_count],
            finished: vec![false; rollouts],
            stalled: vec![false; rollouts],
        }
    }

    /// Total number of rollouts `B × P`.
    pub fn rollouts(&self) -> usize {
        self.batch_size * self.pomo_size
    }

    /// Flat rollout index of `(batch, pomo)`.
    pub fn index(&self, batch: usize, pomo: usize) -> usize {
        batch * self.pomo_size + pomo
    }

    /// Instance that rollout `r` belongs to.
    pub fn instance_of(&self, rollout: usize) -> usize {
        rollout / self.pomo_size
    }

    /// Visited flags of one rollout.
    pub fn visited_row(&self, rollout: usize) -> &[bool] {
        &self.visited[rollout * self.node_count..(rollout + 1) * self.node_count]
    }

    /// Feasibility row of one rollout.
    pub fn feasible_row(&self, rollout: usize) -> &[bool] {
        &self.feasible[rollout * self.node_count..(rollout + 1) * self.node_count]
    }

    /// Returns true once every customer of the rollout has been visited.
    pub fn all_customers_visited(&self, rollout: usize) -> bool {
        self.visited_row(rollout)[DEPOT + 1..].iter().all(|v| *v)
    }

    /// Selected-node history of one rollout.
    pub fn history(&self, rollout: usize) -> &[usize] {
        &self.selected_node_list[rollout]
    }

    /// Current load of one rollout.
    pub fn load(&self, rollout: usize) -> f64 {
        self.load[rollout]
    }

    /// Returns true if every rollout is finished.
    pub fn all_finished(&self) -> bool {
        self.finished.iter().all(|f| *f)
    }

    /// Number of finished rollouts.
    pub fn finished_count(&self) -> usize {
        self.finished.iter().filter(|f| **f).count()
    }
}

/// Static geometry returned by `reset` for the policy to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetState {
    pub batch_size: usize,
    pub problem_size: usize,
    /// Depot position per instance, `B`.
    pub depot_xy: Vec<Position>,
    /// Customer positions, `B × N`.
    pub node_xy: Vec<Position>,
    /// Customer demands, `B × N`.
    pub node_demand: Vec<f64>,
}

impl ResetState {
    pub(crate) fn from_batch(batch: &ProblemBatch) -> Self {
        Self {
            batch_size: batch.batch_size(),
            problem_size: batch.problem_size(),
            depot_xy: batch.depot_xy().to_vec(),
            node_xy: batch.node_xy().to_vec(),
            node_demand: batch.node_demand().to_vec(),
        }
    }

    /// Depot+node coordinates of one instance, depot first.
    pub fn depot_node_xy(&self, batch: usize) -> Vec<Position> {
        let n = self.problem_size;
        std::iter::once(self.depot_xy[batch])
            .chain(self.node_xy[batch * n..(batch + 1) * n].iter().copied())
            .collect()
    }
}

/// Snapshot of the dynamic state exposed to the policy each step.
///
/// Illegal candidates carry `-inf` in [`StepState::ninf_mask`], legal ones `0.0`,
/// so the mask can be added to policy logits directly.
#[derive(Debug, Clone, PartialEq)]
pub struct StepState {
    pub batch_size: usize,
    pub pomo_size: usize,
    pub node_count: usize,
    pub selected_count: usize,
    /// `B × P`.
    pub load: Vec<f64>,
    /// `B × P`, `None` before the first step.
    pub current_node: Vec<Option<usize>>,
    /// `B × P × (N+1)`.
    pub ninf_mask: Vec<f64>,
    /// `B × P`.
    pub finished: Vec<bool>,
    /// `B × (N+1)`.
    pub to_delivery: Vec<u8>,
    /// `B × (N+1)`.
    pub to_pickup: Vec<u8>,
}

impl StepState {
    pub(crate) fn capture(state: &RolloutState, template: &PhaseTemplate) -> Self {
        Self {
            batch_size: state.batch_size,
            pomo_size: state.pomo_size,
            node_count: state.node_count,
            selected_count: state.selected_count,
            load: state.load.clone(),
            current_node: state.current_node.clone(),
            ninf_mask: to_ninf_mask(&state.feasible),
            finished: state.finished.clone(),
            to_delivery: template.to_delivery().to_vec(),
            to_pickup: template.to_pickup().to_vec(),
        }
    }

    /// Total number of rollouts `B × P`.
    pub fn rollouts(&self) -> usize {
        self.batch_size * self.pomo_size
    }

    /// Mask row of rollout `r`.
    pub fn mask_row(&self, rollout: usize) -> &[f64] {
        &self.ninf_mask[rollout * self.node_count..(rollout + 1) * self.node_count]
    }

    /// Returns true if `node` is a legal selection for rollout `r`.
    pub fn is_legal(&self, rollout: usize, node: usize) -> bool {
        self.mask_row(rollout)[node] != f64::NEG_INFINITY
    }

    /// Legal candidates of rollout `r`, in ascending node order.
    pub fn legal_nodes(&self, rollout: usize) -> impl Iterator<Item = usize> + '_ {
        self.mask_row(rollout)
            .iter()
            .enumerate()
            .filter(|(_, bias)| **bias != f64::NEG_INFINITY)
            .map(|(j, _)| j)
    }

    /// Returns true if every rollout is finished.
    pub fn all_finished(&self) -> bool {
        self.finished.iter().all(|f| *f)
    }
}

/// Projects boolean feasibility onto the additive logit-bias convention.
pub fn to_ninf_mask(feasible: &[bool]) -> Vec<f64> {
    feasible
        .iter()
        .map(|legal| if *legal { 0.0 } else { f64::NEG_INFINITY })
        .collect()
}
