// src/policy.rs
//
// Action-selection policies used to drive episodes.
//
// - Policy: maps observations + masks to an ActionSet
// - NoopPolicy: every agent takes the no-op
// - FixedPolicy: a constant action per component, where the mask allows it
// - RandomPolicy: uniform over allowed actions, from its own seeded RNG
//
// Policies only ever pick actions the masks allow, so a policy-driven
// episode never has actions forced to the no-op.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::components::{ActionSet, ComponentKind};
use crate::env::MaskSet;
use crate::observation::Observation;
use crate::world::AgentId;

/// Interface for all action-selection policies.
pub trait Policy: Send + Sync {
    /// Unique version string for this policy implementation.
    fn version(&self) -> &str;

    /// Choose actions for every agent that has a mask in `masks`.
    fn act(
        &mut self,
        observations: &BTreeMap<AgentId, Observation>,
        masks: &MaskSet,
    ) -> ActionSet;

    /// Reset the policy for a new episode.
    ///
    /// The seed enables deterministic episode sequences.
    fn reset_episode(&mut self, seed: u64, episode_id: u64);
}

/// Takes the no-op everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPolicy;

impl Policy for NoopPolicy {
    fn version(&self) -> &str {
        "noop-v1"
    }

    fn act(&mut self, _: &BTreeMap<AgentId, Observation>, _: &MaskSet) -> ActionSet {
        ActionSet::new()
    }

    fn reset_episode(&mut self, _seed: u64, _episode_id: u64) {}
}

/// Plays the same action index in a component for every agent that has a
/// mask there. Disallowed indices fall back to the no-op.
#[derive(Debug, Default, Clone)]
pub struct FixedPolicy {
    actions: BTreeMap<ComponentKind, usize>,
}

impl FixedPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, component: ComponentKind, action: usize) -> Self {
        self.actions.insert(component, action);
        self
    }
}

impl Policy for FixedPolicy {
    fn version(&self) -> &str {
        "fixed-v1"
    }

    fn act(&mut self, _: &BTreeMap<AgentId, Observation>, masks: &MaskSet) -> ActionSet {
        let mut out = ActionSet::new();
        for (kind, action) in &self.actions {
            let Some(component_masks) = masks.get(kind) else {
                continue;
            };
            for (agent, mask) in component_masks {
                if mask.get(*action).copied().unwrap_or(false) {
                    out.set(*agent, *kind, *action);
                }
            }
        }
        out
    }

    fn reset_episode(&mut self, _seed: u64, _episode_id: u64) {}
}

/// Picks uniformly among the allowed actions of every agent.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn version(&self) -> &str {
        "random-v1"
    }

    fn act(&mut self, _: &BTreeMap<AgentId, Observation>, masks: &MaskSet) -> ActionSet {
        let mut out = ActionSet::new();
        for (kind, component_masks) in masks {
            for (agent, mask) in component_masks {
                let allowed: Vec<usize> = mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, ok)| ok.then_some(i))
                    .collect();
                if let Some(action) = allowed.choose(&mut self.rng) {
                    out.set(*agent, *kind, *action);
                }
            }
        }
        out
    }

    fn reset_episode(&mut self, seed: u64, episode_id: u64) {
        // Distinct stream per episode, independent of the environment's RNG.
        self.rng = ChaCha8Rng::seed_from_u64(seed ^ episode_id.rotate_left(32) ^ 0x9E37_79B9);
    }
}
