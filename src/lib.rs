//! vrpb_env - batched rollout environment for the capacitated vehicle
//! routing problem with backhauls.
//!
//! Many parallel rollouts per instance build tours one node at a time.
//! Each step the environment updates load and visitation, then masks the
//! candidates according to a delivery, pickup or fallback phase.

pub mod env;

pub use env::{EnvConfig, EnvError, StepResult, VrpbEnv};
