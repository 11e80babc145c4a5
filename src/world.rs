// src/world.rs
//
// Entity registry: miners, the planner and the global tick.
//
// Miner identity is the index into `World::miners`; it is stable for the
// lifetime of the world and implies no priority.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::endogenous::{MinerState, PlannerState};

/// Identity of an acting entity.
///
/// Serialized as a plain string (`"0"`, `"1"`, ..., `"p"`) so it can key
/// JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AgentId {
    Miner(usize),
    Planner,
}

impl AgentId {
    pub fn class(&self) -> AgentClass {
        match self {
            AgentId::Miner(_) => AgentClass::Miner,
            AgentId::Planner => AgentClass::Planner,
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentId::Miner(idx) => write!(f, "{idx}"),
            AgentId::Planner => f.write_str("p"),
        }
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AgentId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "p" {
            return Ok(AgentId::Planner);
        }
        s.parse::<usize>()
            .map(AgentId::Miner)
            .map_err(|_| format!("not an agent id: {s:?}"))
    }
}

/// Class of an acting entity; action spaces are declared per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentClass {
    Miner,
    Planner,
}

/// All endogenous state of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub miners: Vec<MinerState>,
    pub planner: PlannerState,
    pub tick: u64,
}

impl World {
    /// A world of `num_miners` zeroed miners at tick 0.
    pub fn new(num_miners: usize) -> Self {
        Self {
            miners: vec![MinerState::default(); num_miners],
            planner: PlannerState::default(),
            tick: 0,
        }
    }

    pub fn num_miners(&self) -> usize {
        self.miners.len()
    }

    /// Miner ids in index order, followed by the planner.
    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        (0..self.miners.len())
            .map(AgentId::Miner)
            .chain(std::iter::once(AgentId::Planner))
    }

    /// A fresh permutation of miner indices drawn from `rng`.
    pub fn random_order<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.miners.len()).collect();
        order.shuffle(rng);
        order
    }

    /// Current effective green-score weight as published by the planner.
    pub fn green_score_importance(&self) -> f64 {
        self.planner.green_score_importance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_agent_id_string_round_trip() {
        for id in [AgentId::Miner(0), AgentId::Miner(17), AgentId::Planner] {
            let s: String = id.into();
            assert_eq!(AgentId::try_from(s).unwrap(), id);
        }
        assert!(AgentId::try_from("x1".to_string()).is_err());
    }

    #[test]
    fn test_agent_id_keys_json_maps() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(AgentId::Miner(2), 1.5);
        map.insert(AgentId::Planner, -0.5);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"2":1.5,"p":-0.5}"#);
    }

    #[test]
    fn test_agent_ids_end_with_planner() {
        let world = World::new(3);
        let ids: Vec<_> = world.agent_ids().collect();
        assert_eq!(
            ids,
            vec![
                AgentId::Miner(0),
                AgentId::Miner(1),
                AgentId::Miner(2),
                AgentId::Planner
            ]
        );
    }

    #[test]
    fn test_random_order_is_seeded_permutation() {
        let world = World::new(12);
        let a = world.random_order(&mut ChaCha8Rng::seed_from_u64(9));
        let b = world.random_order(&mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..12).collect::<Vec<_>>());
    }
}
