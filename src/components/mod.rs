// src/components/mod.rs
//
// Policy components.
//
// A component declares a discrete action space per agent class, publishes
// per-tick action masks, and mutates the endogenous state it owns when the
// chosen actions are applied. Components are a closed set resolved from
// `SimConfig::components` at environment construction; they run in list
// order, one after the other, inside a tick.
//
// Action indexing: a component declaring `N` actions accepts `0..=N`.
// Index 0 is the no-op and is never masked out.

pub mod green_score_importance;
pub mod rec_purchase;

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ComponentConfig;
use crate::error::{SimError, SimResult};
use crate::world::{AgentClass, AgentId, World};

pub use green_score_importance::GreenScoreImportance;
pub use rec_purchase::RecPurchase;

/// Per-agent boolean masks; entry `i` allows action index `i`.
pub type ActionMasks = BTreeMap<AgentId, Vec<bool>>;

/// Stable identifier of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    GreenScoreImportance,
    RecPurchase,
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::GreenScoreImportance => "GreenScoreImportance",
            ComponentKind::RecPurchase => "RecPurchase",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Chosen actions for one tick, keyed by agent and component.
///
/// Entries that were never set read as the no-op (0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    actions: BTreeMap<(AgentId, ComponentKind), usize>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, agent: AgentId, component: ComponentKind, action: usize) {
        self.actions.insert((agent, component), action);
    }

    /// Builder-style `set`.
    pub fn with(mut self, agent: AgentId, component: ComponentKind, action: usize) -> Self {
        self.set(agent, component, action);
        self
    }

    pub fn get(&self, agent: AgentId, component: ComponentKind) -> usize {
        self.actions
            .get(&(agent, component))
            .copied()
            .unwrap_or(0)
    }

    /// Every (agent, component) pair that carries an explicit entry.
    pub fn addressed(&self) -> impl Iterator<Item = (AgentId, ComponentKind)> + '_ {
        self.actions.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Replace every action not allowed by `masks` with the no-op.
    ///
    /// Returns the agents whose action was forced.
    pub fn force_masked_to_noop(
        &mut self,
        component: ComponentKind,
        masks: &ActionMasks,
    ) -> Vec<AgentId> {
        let mut forced = Vec::new();
        for ((agent, kind), action) in self.actions.iter_mut() {
            if *kind != component || *action == 0 {
                continue;
            }
            let allowed = masks
                .get(agent)
                .and_then(|m| m.get(*action))
                .copied()
                .unwrap_or(false);
            if !allowed {
                *action = 0;
                forced.push(*agent);
            }
        }
        forced
    }
}

/// Check that `action` lies in `0..=max`.
pub(crate) fn check_action(
    component: ComponentKind,
    agent: AgentId,
    action: usize,
    max: usize,
) -> SimResult<()> {
    if action > max {
        return Err(SimError::InvalidAction {
            component,
            agent,
            action,
            max,
        });
    }
    Ok(())
}

/// The closed set of policy components.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    GreenScoreImportance(GreenScoreImportance),
    RecPurchase(RecPurchase),
}

impl Component {
    pub fn from_config(cfg: &ComponentConfig) -> Self {
        match cfg {
            ComponentConfig::GreenScoreImportance(c) => {
                Component::GreenScoreImportance(GreenScoreImportance::new(c.clone()))
            }
            ComponentConfig::RecPurchase(c) => Component::RecPurchase(RecPurchase::new(c.clone())),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::GreenScoreImportance(_) => ComponentKind::GreenScoreImportance,
            Component::RecPurchase(_) => ComponentKind::RecPurchase,
        }
    }

    /// Number of non-no-op actions for `class`, or None if the class does
    /// not act through this component.
    pub fn n_actions(&self, class: AgentClass) -> Option<usize> {
        match self {
            Component::GreenScoreImportance(c) => c.n_actions(class),
            Component::RecPurchase(c) => c.n_actions(class),
        }
    }

    /// Re-initialize per-episode state after agent states were reset.
    pub fn reset(&mut self, world: &mut World) {
        match self {
            Component::GreenScoreImportance(c) => c.reset(world),
            Component::RecPurchase(c) => c.reset(world),
        }
    }

    /// Masks for the actions applied at `world.tick`.
    pub fn generate_masks(&self, world: &World) -> ActionMasks {
        match self {
            Component::GreenScoreImportance(c) => c.generate_masks(world),
            Component::RecPurchase(c) => c.generate_masks(world),
        }
    }

    /// Reject any action outside the declared range without touching state.
    pub fn validate_actions(&self, world: &World, actions: &ActionSet) -> SimResult<()> {
        let kind = self.kind();
        for agent in world.agent_ids() {
            if let Some(max) = self.n_actions(agent.class()) {
                check_action(kind, agent, actions.get(agent, kind), max)?;
            }
        }
        Ok(())
    }

    /// Apply the chosen actions. Either every action is applied or, on
    /// error, none is.
    pub fn component_step<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        actions: &ActionSet,
        rng: &mut R,
    ) -> SimResult<()> {
        match self {
            Component::GreenScoreImportance(c) => c.component_step(world, actions),
            Component::RecPurchase(c) => c.component_step(world, actions, rng),
        }
    }

    /// Scalar diagnostics contributed by this component.
    pub fn metrics(&self, world: &World) -> Vec<(String, f64)> {
        match self {
            Component::GreenScoreImportance(c) => c.metrics(world),
            Component::RecPurchase(c) => c.metrics(world),
        }
    }

    /// Extra observation fields this component exposes to `agent`.
    pub fn observation_fields(&self, agent: AgentId) -> Vec<(String, f64)> {
        match self {
            Component::GreenScoreImportance(_) => Vec::new(),
            Component::RecPurchase(c) => c.observation_fields(agent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    #[test]
    fn test_action_set_defaults_to_noop() {
        let actions = ActionSet::new().with(AgentId::Miner(1), ComponentKind::RecPurchase, 4);
        assert_eq!(actions.get(AgentId::Miner(1), ComponentKind::RecPurchase), 4);
        assert_eq!(actions.get(AgentId::Miner(0), ComponentKind::RecPurchase), 0);
        assert_eq!(
            actions.get(AgentId::Planner, ComponentKind::GreenScoreImportance),
            0
        );
    }

    #[test]
    fn test_force_masked_to_noop() {
        let mut masks = ActionMasks::new();
        masks.insert(AgentId::Planner, vec![true, false, false]);

        let mut actions = ActionSet::new()
            .with(AgentId::Planner, ComponentKind::GreenScoreImportance, 2)
            .with(AgentId::Miner(0), ComponentKind::RecPurchase, 2);
        let forced = actions.force_masked_to_noop(ComponentKind::GreenScoreImportance, &masks);

        assert_eq!(forced, vec![AgentId::Planner]);
        assert_eq!(
            actions.get(AgentId::Planner, ComponentKind::GreenScoreImportance),
            0
        );
        // Other components are left alone.
        assert_eq!(actions.get(AgentId::Miner(0), ComponentKind::RecPurchase), 2);
    }

    #[test]
    fn test_components_resolve_from_config_in_order() {
        let cfg = SimConfig::default();
        let kinds: Vec<_> = cfg
            .components
            .iter()
            .map(|c| Component::from_config(c).kind())
            .collect();
        assert_eq!(
            kinds,
            vec![ComponentKind::GreenScoreImportance, ComponentKind::RecPurchase]
        );
    }

    #[test]
    fn test_validate_actions_checks_every_agent() {
        let cfg = SimConfig::default();
        let component = Component::from_config(&cfg.components[1]);
        let world = World::new(3);

        let ok = ActionSet::new().with(AgentId::Miner(2), ComponentKind::RecPurchase, 20);
        component.validate_actions(&world, &ok).unwrap();

        let bad = ActionSet::new().with(AgentId::Miner(2), ComponentKind::RecPurchase, 21);
        let err = component.validate_actions(&world, &bad).unwrap_err();
        assert_eq!(
            err,
            SimError::InvalidAction {
                component: ComponentKind::RecPurchase,
                agent: AgentId::Miner(2),
                action: 21,
                max: 20,
            }
        );
    }
}
