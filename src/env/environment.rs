//! Batched CVRP-with-backhauls rollout environment.
//!
//! Implements the step loop: record selections → update load and
//! visitation → mask for the active phase → update finished → reward.

use tracing::{debug, trace, warn};

use super::config::EnvConfig;
use super::error::EnvError;
use super::masking::MaskingEngine;
use super::phase::{Phase, PhaseTemplate};
use super::problem::{ProblemBatch, ProblemSource, RandomProblems, SavedProblems};
use super::reward::RewardComputer;
use super::state::{ResetState, RolloutState, StepState};
use super::transition::Transition;
use super::types::Position;

/// Result of `reset`, `pre_step` and `step`.
#[derive(Debug, Clone)]
pub struct StepResult<S> {
    /// State exposed to the policy.
    pub state: S,
    /// Negated tour length per rollout (`B × P`), once every rollout is finished.
    pub reward: Option<Vec<f64>>,
    /// Whether every rollout is finished.
    pub done: bool,
}

/// Problem data of the current batch plus its depot+node tables.
#[derive(Debug, Clone)]
struct LoadedProblems {
    batch: ProblemBatch,
    depot_node_xy: Vec<Position>,
    depot_node_demand: Vec<f64>,
}

/// The batched rollout environment.
///
/// # Lifecycle
///
/// 1. Call [`VrpbEnv::new`] with a configuration.
/// 2. Optionally switch to a fixed pool with [`VrpbEnv::use_saved_problems`].
/// 3. Call [`VrpbEnv::load_problems`] then [`VrpbEnv::reset`].
/// 4. Call [`VrpbEnv::pre_step`], then [`VrpbEnv::step`] with one node per
///    rollout until `done`; the final step carries the reward.
#[derive(Debug)]
pub struct VrpbEnv {
    config: EnvConfig,
    source: Box<dyn ProblemSource>,
    problems: Option<LoadedProblems>,
    template: Option<PhaseTemplate>,
    state: Option<RolloutState>,
}

impl VrpbEnv {
    /// Creates an environment drawing random problems seeded from the config.
    pub fn new(config: EnvConfig) -> Result<Self, EnvError> {
        config.validate()?;
        let source = Box::new(RandomProblems::new(config.seed));
        Ok(Self {
            config,
            source,
            problems: None,
            template: None,
            state: None,
        })
    }

    /// Creates an environment with a custom problem source.
    pub fn with_source(
        config: EnvConfig,
        source: Box<dyn ProblemSource>,
    ) -> Result<Self, EnvError> {
        let mut env = Self::new(config)?;
        env.source = source;
        Ok(env)
    }

    /// Switches subsequent [`VrpbEnv::load_problems`] calls to a fixed pool.
    pub fn use_saved_problems(&mut self, saved: SavedProblems) {
        debug!(pool = saved.len(), "using saved problems");
        self.source = Box::new(saved);
    }

    /// Environment configuration.
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Name of the active problem source.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Effective batch size (after augmentation), if problems are loaded.
    pub fn batch_size(&self) -> Option<usize> {
        self.problems.as_ref().map(|p| p.batch.batch_size())
    }

    /// Dynamic state of the current episode, if reset.
    pub fn state(&self) -> Option<&RolloutState> {
        self.state.as_ref()
    }

    /// Loads `batch_size` instances from the active source.
    ///
    /// With `augmentation_factor == 8` every instance is replicated into the
    /// 8 symmetric folds and the effective batch becomes `8 × batch_size`.
    /// Any factor other than 1 or 8 is rejected before the source is touched.
    pub fn load_problems(
        &mut self,
        batch_size: usize,
        augmentation_factor: usize,
    ) -> Result<(), EnvError> {
        if !matches!(augmentation_factor, 1 | 8) {
            return Err(EnvError::UnsupportedAugmentation(augmentation_factor));
        }
        let mut batch = self
            .source
            .next_batch(batch_size, self.config.problem_size)
            .inspect_err(|e| {
                warn!(source = self.source.name(), error = %e, "problem source rejected load")
            })?;
        if augmentation_factor == 8 {
            batch = batch.augment_by_8_fold();
        }
        debug!(
            source = self.source.name(),
            batch = batch.batch_size(),
            problem_size = batch.problem_size(),
            augmentation_factor,
            "loaded problems"
        );
        self.problems = Some(LoadedProblems {
            depot_node_xy: batch.depot_node_xy(),
            depot_node_demand: batch.depot_node_demand(),
            batch,
        });
        self.template = None;
        self.state = None;
        Ok(())
    }

    /// Starts a new episode over the loaded batch.
    ///
    /// The initial mask follows the block-0 delivery rule, so only the depot
    /// and delivery-type customers are selectable on the first step.
    /// Returns the static geometry; there is no reward yet.
    pub fn reset(&mut self) -> Result<StepResult<ResetState>, EnvError> {
        let problems = self.problems.as_ref().ok_or(EnvError::NotLoaded)?;
        let batch_size = problems.batch.batch_size();
        let pomo = self.config.pomo_size;
        let problem_size = self.config.problem_size;

        let mut state = RolloutState::new(batch_size, pomo, problem_size + 1);
        let template = PhaseTemplate::new(batch_size, problem_size, pomo);
        MaskingEngine::new(
            &problems.depot_node_demand,
            &template,
            self.config.round_error_epsilon,
            self.config.fallback,
        )
        .apply(&mut state, Phase::Delivery);
        self.state = Some(state);
        self.template = Some(template);
        debug!(batch = batch_size, pomo, problem_size, "reset");

        Ok(StepResult {
            state: ResetState::from_batch(&problems.batch),
            reward: None,
            done: false,
        })
    }

    /// Exposes the dynamic state before the first action is requested.
    pub fn pre_step(&self) -> Result<StepResult<StepState>, EnvError> {
        Ok(StepResult {
            state: self.snapshot()?,
            reward: None,
            done: false,
        })
    }

    /// Advances every rollout by one selected node.
    ///
    /// `selected` holds one node index per rollout, instance-major
    /// (`b * P + p`). Selections must be legal under the current mask; an
    /// illegal or out-of-range node is rejected and the state is unchanged.
    pub fn step(&mut self, selected: &[usize]) -> Result<StepResult<StepState>, EnvError> {
        let problems = self.problems.as_ref().ok_or(EnvError::NotLoaded)?;
        let template = self.template.as_ref().ok_or(EnvError::NotReset)?;
        let state = self.state.as_mut().ok_or(EnvError::NotReset)?;

        Transition::validate(state, selected)?;
        Transition::apply(state, selected, &problems.depot_node_demand);

        let phase = Phase::of(state.selected_count, self.config.pomo_size);
        let engine = MaskingEngine::new(
            &problems.depot_node_demand,
            template,
            self.config.round_error_epsilon,
            self.config.fallback,
        );
        // Finished flags are refreshed first so the terminal depot unmask
        // covers rollouts finishing on this very step.
        let newly_finished = Transition::update_finished(state);
        let outcome = engine.apply(state, phase);

        trace!(
            step = state.selected_count,
            %phase,
            stalled = outcome.stalled,
            depot_forced = outcome.depot_forced,
            newly_finished,
            finished = state.finished_count(),
            "step"
        );

        let done = state.all_finished();
        let reward = done.then(|| {
            RewardComputer::compute(
                &state.selected_node_list,
                &problems.depot_node_xy,
                state.node_count,
                state.pomo_size,
            )
        });
        if done {
            debug!(steps = state.selected_count, "all rollouts finished");
        }

        Ok(StepResult {
            state: StepState::capture(state, template),
            reward,
            done,
        })
    }

    fn snapshot(&self) -> Result<StepState, EnvError> {
        match (self.state.as_ref(), self.template.as_ref()) {
            (Some(state), Some(template)) => Ok(StepState::capture(state, template)),
            _ => Err(EnvError::NotReset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env() -> VrpbEnv {
        VrpbEnv::new(EnvConfig::new(6, 3)).unwrap()
    }

    #[test]
    fn lifecycle_order_is_enforced() {
        let mut env = make_env();
        assert!(matches!(env.reset(), Err(EnvError::NotLoaded)));
        assert!(matches!(env.step(&[0; 3]), Err(EnvError::NotLoaded)));
        env.load_problems(2, 1).unwrap();
        assert!(matches!(env.pre_step(), Err(EnvError::NotReset)));
        assert!(matches!(env.step(&[0; 6]), Err(EnvError::NotReset)));
    }

    #[test]
    fn reset_returns_geometry_without_reward() {
        let mut env = make_env();
        env.load_problems(2, 1).unwrap();
        let result = env.reset().unwrap();
        assert_eq!(result.state.depot_xy.len(), 2);
        assert_eq!(result.state.node_xy.len(), 12);
        assert_eq!(result.state.node_demand.len(), 12);
        assert!(result.reward.is_none());
        assert!(!result.done);
    }

    #[test]
    fn pre_step_mirrors_fresh_state() {
        let mut env = make_env();
        env.load_problems(2, 1).unwrap();
        env.reset().unwrap();
        let result = env.pre_step().unwrap();
        let s = result.state;
        assert_eq!(s.selected_count, 0);
        assert_eq!(s.load, vec![1.0; 6]);
        assert_eq!(s.current_node, vec![None; 6]);
        assert_eq!(s.ninf_mask.len(), 6 * 7);
        let ninf = f64::NEG_INFINITY;
        for r in 0..6 {
            assert_eq!(s.mask_row(r), &[0.0, 0.0, 0.0, 0.0, ninf, ninf, ninf]);
        }
        assert_eq!(&s.to_delivery[..7], &[1, 1, 1, 1, 0, 0, 0]);
        assert!(result.reward.is_none());
    }

    #[test]
    fn unsupported_augmentation_fails_fast() {
        let mut env = make_env();
        assert_eq!(
            env.load_problems(2, 4),
            Err(EnvError::UnsupportedAugmentation(4))
        );
        assert!(env.batch_size().is_none());
    }

    #[test]
    fn augmentation_multiplies_batch() {
        let mut env = make_env();
        env.load_problems(3, 8).unwrap();
        assert_eq!(env.batch_size(), Some(24));
        let reset = env.reset().unwrap().state;
        assert_eq!(reset.depot_xy.len(), 24);
        assert_eq!(env.pre_step().unwrap().state.load.len(), 72);
    }

    #[test]
    fn illegal_step_leaves_state_unchanged() {
        let mut env = make_env();
        env.load_problems(1, 1).unwrap();
        env.reset().unwrap();
        env.step(&[0, 0, 0]).unwrap();
        let before = env.pre_step().unwrap().state;
        // The depot was just visited and is masked.
        assert_eq!(
            env.step(&[0, 1, 2]).unwrap_err(),
            EnvError::IllegalAction {
                batch: 0,
                pomo: 0,
                node: 0
            }
        );
        assert_eq!(env.pre_step().unwrap().state, before);
    }

    #[test]
    fn env_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<VrpbEnv>();
    }

    #[test]
    fn load_problems_discards_episode() {
        let mut env = make_env();
        env.load_problems(1, 1).unwrap();
        env.reset().unwrap();
        env.load_problems(1, 1).unwrap();
        assert!(env.state().is_none());
        assert!(matches!(env.pre_step(), Err(EnvError::NotReset)));
    }
}
