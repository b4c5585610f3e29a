//! Batched CVRP-with-backhauls rollout environment.
//!
//! The [`VrpbEnv`] advances `B` instances × `P` rollouts in lock-step. Each
//! step the [`Transition`] records the selected nodes, the [`MaskingEngine`]
//! recomputes legality for the active [`Phase`], and once every rollout is
//! finished the [`RewardComputer`] scores the tours.

pub mod config;
pub mod environment;
pub mod error;
pub mod masking;
pub mod metrics;
pub mod phase;
pub mod policy;
pub mod problem;
pub mod reward;
pub mod state;
pub mod transition;
pub mod types;


pub use config::{EnvConfig, FallbackRule};
pub use environment::{StepResult, VrpbEnv};
pub use error::EnvError;
pub use masking::{MaskOutcome, MaskingEngine};
pub use metrics::EvaluationMetrics;
pub use phase::{Phase, PhaseTemplate};
pub use policy::{NearestFeasiblePolicy, Policy, RandomPolicy};
pub use problem::{augment_xy_by_8_fold, ProblemBatch, ProblemSource, RandomProblems, SavedProblems};
pub use reward::RewardComputer;
pub use state::{ResetState, RolloutState, StepState};
pub use transition::Transition;
pub use types::{NodeKind, Position, DEPOT};

#[cfg(feature = "serde")]
pub use problem::SavedProblemsRecord;
