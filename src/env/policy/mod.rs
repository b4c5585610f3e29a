//! Policy trait and baseline implementations.

pub mod heuristic;
pub mod random;
pub mod trait_;

pub use heuristic::NearestFeasiblePolicy;
pub use random::RandomPolicy;
pub use trait_::Policy;
