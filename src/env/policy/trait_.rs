//! Policy trait for the rollout environment.

use crate::env::state::{ResetState, StepState};

/// A policy that selects the next node for every rollout.
///
/// Selections are node indices in `[0, N]`, one per rollout in
/// instance-major order, and must be legal under `state.ninf_mask`.
pub trait Policy: Send {
    /// Receives the static geometry of a new episode.
    ///
    /// The default ignores it; geometry-aware policies override this.
    fn on_reset(&mut self, _reset: &ResetState) {}

    /// Selects one node per rollout given the current step state.
    fn select_actions(&mut self, state: &StepState) -> Vec<usize>;

    /// Returns a human-readable name for this policy.
    fn name(&self) -> &str;
}
