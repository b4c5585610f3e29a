//! Phase scheduling and the static delivery/pickup template.
//!
//! The tour alternates between delivery and pickup sub-phases of `P + 1`
//! steps each. The active phase depends only on the step counter and the
//! rollout width; nothing is stored per rollout.

use std::fmt;

use super::types::{NodeKind, DEPOT};

/// Constraint regime applied when masking after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Only delivery-type nodes whose demand fits in the remaining load.
    Delivery,
    /// Only pickup-type nodes, depot as a last resort.
    Pickup,
    /// Scheduled blocks exhausted; see [`FallbackRule`](super::config::FallbackRule).
    Fallback,
}

impl Phase {
    /// Phase in force after `step_count` steps have been taken.
    ///
    /// Step `k = step_count - 1` falls in delivery block `n` when
    /// `2n(P+1) <= k < (2n+1)(P+1)` and in pickup block `n` when
    /// `(2n+1)(P+1) <= k < (2n+2)(P+1)`. Once `step_count >= P²` the
    /// schedule is over.
    pub fn of(step_count: usize, pomo_size: usize) -> Phase {
        if step_count >= pomo_size * pomo_size {
            return Phase::Fallback;
        }
        let sub_phase = step_count.saturating_sub(1) / (pomo_size + 1);
        if sub_phase % 2 == 0 {
            Phase::Delivery
        } else {
            Phase::Pickup
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Delivery => write!(f, "delivery"),
            Phase::Pickup => write!(f, "pickup"),
            Phase::Fallback => write!(f, "fallback"),
        }
    }
}

/// Static 0/1 classification of every location, `B × (N+1)`.
///
/// The depot and customers `1..=P` are delivery-type; customers `P+1..=N`
/// are pickup-type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTemplate {
    node_count: usize,
    to_delivery: Vec<u8>,
    to_pickup: Vec<u8>,
}

impl PhaseTemplate {
    /// Builds the template for `batch_size` instances.
    pub fn new(batch_size: usize, problem_size: usize, pomo_size: usize) -> Self {
        let node_count = problem_size + 1;
        let row_delivery: Vec<u8> = (0..node_count)
            .map(|j| u8::from(j <= pomo_size))
            .collect();
        let row_pickup: Vec<u8> = row_delivery.iter().map(|d| 1 - d).collect();
        Self {
            node_count,
            to_delivery: row_delivery.repeat(batch_size),
            to_pickup: row_pickup.repeat(batch_size),
        }
    }

    /// Classification of location `node` (identical across instances).
    pub fn kind(&self, node: usize) -> NodeKind {
        if self.to_delivery[node] == 1 {
            NodeKind::Delivery
        } else {
            NodeKind::Pickup
        }
    }

    /// Returns true if `node` may be served during a delivery sub-phase.
    pub fn is_delivery(&self, node: usize) -> bool {
        self.to_delivery[node] == 1
    }

    /// Returns true if `node` may be served during a pickup sub-phase.
    pub fn is_pickup(&self, node: usize) -> bool {
        self.to_pickup[node] == 1
    }

    /// Number of locations per instance.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Delivery indicators, `B × (N+1)`.
    pub fn to_delivery(&self) -> &[u8] {
        &self.to_delivery
    }

    /// Pickup indicators, `B × (N+1)`.
    pub fn to_pickup(&self) -> &[u8] {
        &self.to_pickup
    }

    /// Customer indices of the given kind (the depot is never listed).
    pub fn customers(&self, kind: NodeKind) -> impl Iterator<Item = usize> + '_ {
        (DEPOT + 1..self.node_count).filter(move |&j| self.kind(j) == kind)
    }
}
