// src/env.rs
//
// Gym-style multi-agent environment around the storage economy.
//
// Lifecycle:
// - reset(seed) -> observations
// - compute_masks() -> per-component masks for the next step
// - step(actions) -> (observations, rewards, done, info, next masks)
//
// Inside a step the order is fixed: every component runs (planner side
// first, as enforced by config validation), then the scenario step, then
// rewards. All randomness comes from one ChaCha8Rng seeded at reset, so a
// seed plus an action sequence fully determines an episode.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::components::{ActionMasks, ActionSet, Component, ComponentKind};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::observation::Observation;
use crate::sampling::Selection;
use crate::scenario::{MetricSnapshot, ScenarioEngine};
use crate::world::{AgentClass, AgentId, World};

/// Masks of every component, keyed by component.
pub type MaskSet = BTreeMap<ComponentKind, ActionMasks>;

/// Result of a single environment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Observations after the step.
    pub observations: BTreeMap<AgentId, Observation>,
    /// Change in each agent's optimization metric over the step.
    pub rewards: BTreeMap<AgentId, f64>,
    /// Whether the episode has terminated.
    pub done: bool,
    pub info: StepInfo,
    /// Masks that apply to the next step.
    pub masks: MaskSet,
}

/// Additional information returned from a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Tick the actions were applied at.
    pub tick: u64,
    /// Miners drawn for new storage (duplicates possible).
    pub selected: Vec<usize>,
    /// Whether selection fell back to uniform draws.
    pub uniform_fallback: bool,
    /// Agents whose masked action was replaced with the no-op.
    pub forced_noops: BTreeMap<ComponentKind, Vec<AgentId>>,
    /// Planner weight in effect after the step.
    pub green_score_importance: f64,
    /// Termination reason if done.
    pub termination_reason: Option<String>,
}

pub struct EconomyEnv {
    config: SimConfig,
    components: Vec<Component>,
    scenario: ScenarioEngine,
    world: World,
    rng: ChaCha8Rng,
    seed: u64,
    done: bool,
}

impl EconomyEnv {
    /// Validate `config`, build the components it lists and reset with seed 0.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let components = config.components.iter().map(Component::from_config).collect();
        let scenario = ScenarioEngine::new(&config);
        let world = World::new(config.num_agents);

        let mut env = Self {
            config,
            components,
            scenario,
            world,
            rng: ChaCha8Rng::seed_from_u64(0),
            seed: 0,
            done: false,
        };
        env.reset(Some(0))?;
        Ok(env)
    }

    /// Start a new episode.
    ///
    /// Without a seed, the next seed is drawn from the current RNG.
    pub fn reset(&mut self, seed: Option<u64>) -> SimResult<BTreeMap<AgentId, Observation>> {
        let seed = seed.unwrap_or_else(|| self.rng.gen());
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);

        self.scenario.reset_agent_states(&mut self.world, &mut self.rng)?;
        for c in self.components.iter_mut() {
            c.reset(&mut self.world);
        }
        self.scenario.reset_snapshot(&self.world);
        self.done = false;

        info!(
            seed,
            num_agents = self.config.num_agents,
            episode_length = self.config.episode_length,
            "episode reset"
        );
        Ok(self.observations())
    }

    /// Number of non-no-op actions `class` has in component `kind`, or None
    /// if the component is not configured or `class` does not act through it.
    pub fn declare_action_space(&self, kind: ComponentKind, class: AgentClass) -> Option<usize> {
        self.components
            .iter()
            .find(|c| c.kind() == kind)
            .and_then(|c| c.n_actions(class))
    }

    /// Masks for the actions the next `step` will apply.
    pub fn compute_masks(&self) -> MaskSet {
        self.components
            .iter()
            .map(|c| (c.kind(), c.generate_masks(&self.world)))
            .collect()
    }

    /// Apply one tick of actions.
    ///
    /// Out-of-range actions fail the whole step with `InvalidAction` before
    /// any state changes. In-range actions that the current masks disallow
    /// are replaced with the no-op. If the scenario step fails, the world is
    /// restored to its state before the call.
    pub fn step(&mut self, actions: &ActionSet) -> SimResult<StepResult> {
        if self.done {
            return Ok(StepResult {
                observations: self.observations(),
                rewards: self.world.agent_ids().map(|id| (id, 0.0)).collect(),
                done: true,
                info: StepInfo {
                    tick: self.world.tick,
                    green_score_importance: self.world.green_score_importance(),
                    termination_reason: Some("Episode already done".to_string()),
                    ..StepInfo::default()
                },
                masks: MaskSet::new(),
            });
        }

        self.check_addressees(actions)?;
        for c in &self.components {
            c.validate_actions(&self.world, actions)?;
        }

        let masks = self.compute_masks();
        let mut actions = actions.clone();
        let mut forced_noops = BTreeMap::new();
        for (kind, component_masks) in &masks {
            let forced = actions.force_masked_to_noop(*kind, component_masks);
            if !forced.is_empty() {
                debug!(tick = self.world.tick, component = %kind, ?forced, "masked actions forced to no-op");
                forced_noops.insert(*kind, forced);
            }
        }

        let checkpoint = (self.world.clone(), self.components.clone(), self.rng.clone());
        let selection = match self.apply(&actions) {
            Ok(selection) => selection,
            Err(err) => {
                (self.world, self.components, self.rng) = checkpoint;
                return Err(err);
            }
        };

        let rewards = self.scenario.compute_rewards(&self.world);
        let applied_tick = self.world.tick;
        self.world.tick += 1;
        self.done = self.world.tick >= self.config.episode_length;

        let info = StepInfo {
            tick: applied_tick,
            selected: selection.draws,
            uniform_fallback: selection.uniform_fallback,
            forced_noops,
            green_score_importance: self.world.green_score_importance(),
            termination_reason: self.done.then(|| "EndOfEpisode".to_string()),
        };
        if self.done {
            info!(seed = self.seed, ticks = self.world.tick, "episode finished");
        }

        Ok(StepResult {
            observations: self.observations(),
            rewards,
            done: self.done,
            info,
            masks: self.compute_masks(),
        })
    }

    /// Reject actions for miners outside the population, or for a component
    /// that is not configured or gives the agent's class no action space.
    fn check_addressees(&self, actions: &ActionSet) -> SimResult<()> {
        for (agent, component) in actions.addressed() {
            let exists = match agent {
                AgentId::Miner(idx) => idx < self.world.num_miners(),
                AgentId::Planner => true,
            };
            if !exists || self.declare_action_space(component, agent.class()).is_none() {
                return Err(SimError::UnknownActor { component, agent });
            }
        }
        Ok(())
    }

    fn apply(&mut self, actions: &ActionSet) -> SimResult<Selection> {
        for c in self.components.iter_mut() {
            c.component_step(&mut self.world, actions, &mut self.rng)?;
        }
        self.scenario.scenario_step(&mut self.world, &mut self.rng)
    }

    /// Observations of every agent for the current state.
    pub fn observations(&self) -> BTreeMap<AgentId, Observation> {
        Observation::build_all(&self.world, &self.components)
    }

    /// Current optimization metric of every agent.
    pub fn optimization_metrics(&self) -> MetricSnapshot {
        self.scenario.current_metrics(&self.world)
    }

    /// Scalar diagnostics from the scenario and every component.
    pub fn compute_metrics(&self) -> BTreeMap<String, f64> {
        let mut out = self.scenario.metrics(&self.world);
        for c in &self.components {
            out.extend(c.metrics(&self.world));
        }
        out
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick(&self) -> u64 {
        self.world.tick
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
