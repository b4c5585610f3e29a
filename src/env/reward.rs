//! Tour-length reward.

use super::types::{Position, DEPOT};

/// Computes rewards for finished batches.
pub struct RewardComputer;

impl RewardComputer {
    /// Length of the closed tour depot → `history` → depot.
    ///
    /// Consecutive pairs are summed with the last point wrapping to the
    /// depot; a history that already starts at the depot adds a zero-length
    /// edge. `xy` is the depot+node table of the rollout's instance.
    pub fn tour_length(history: &[usize], xy: &[Position]) -> f64 {
        let tour = || std::iter::once(&DEPOT).chain(history);
        tour()
            .zip(tour().skip(1).chain(std::iter::once(&DEPOT)))
            .map(|(&from, &to)| xy[from].distance_to(&xy[to]))
            .sum()
    }

    /// Travel distance of every rollout, `B × P`.
    ///
    /// `depot_node_xy` is `B × (N+1)`; rollout `r` uses instance `r / pomo_size`.
    pub fn travel_distances(
        histories: &[Vec<usize>],
        depot_node_xy: &[Position],
        node_count: usize,
        pomo_size: usize,
    ) -> Vec<f64> {
        histories
            .iter()
            .enumerate()
            .map(|(r, history)| {
                let b = r / pomo_size;
                Self::tour_length(history, &depot_node_xy[b * node_count..(b + 1) * node_count])
            })
            .collect()
    }

    /// Reward per rollout: the negated travel distance.
    pub fn compute(
        histories: &[Vec<usize>],
        depot_node_xy: &[Position],
        node_count: usize,
        pomo_size: usize,
    ) -> Vec<f64> {
        Self::travel_distances(histories, depot_node_xy, node_count, pomo_size)
            .into_iter()
            .map(|d| -d)
            .collect()
    }
}
