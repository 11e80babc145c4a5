// src/observation.rs
//
// Serializable per-agent observations.
//
// This is the export boundary where typed endogenous state is turned back
// into name-keyed values:
// - miners see their own scalar endogenous quantities, their green-score
//   window and any fields contributed by components (e.g. the REC price)
// - the planner sees storage-weighted system aggregates and its own weight
//
// Maps are BTreeMaps so serialization order is stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::Component;
use crate::endogenous::GREEN_SCORE_IMPORTANCE;
use crate::rewards::{green_aggregate, reliability_aggregate};
use crate::world::{AgentId, World};

/// Current observation schema version.
/// Increment when adding/removing/changing fields.
pub const OBS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerObservation {
    pub obs_version: u32,
    pub tick: u64,
    /// Scalar endogenous quantities keyed by export name.
    pub endogenous: BTreeMap<String, f64>,
    /// The last day of instantaneous green scores, oldest first.
    pub green_scores_last_day: Vec<f64>,
    /// Fields contributed by policy components.
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerObservation {
    pub obs_version: u32,
    pub tick: u64,
    /// Storage-weighted system reliability.
    pub reliability: f64,
    /// Storage-weighted system greenness.
    pub renewables: f64,
    pub endogenous: BTreeMap<String, f64>,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    Miner(MinerObservation),
    Planner(PlannerObservation),
}

impl Observation {
    /// Observation of `agent` in `world`, or None if `agent` does not exist.
    pub fn build(world: &World, components: &[Component], agent: AgentId) -> Option<Self> {
        let extra: BTreeMap<String, f64> = components
            .iter()
            .flat_map(|c| c.observation_fields(agent))
            .collect();

        match agent {
            AgentId::Miner(idx) => {
                let m = world.miners.get(idx)?;
                Some(Observation::Miner(MinerObservation {
                    obs_version: OBS_VERSION,
                    tick: world.tick,
                    endogenous: m
                        .scalars()
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                    green_scores_last_day: m.green_scores_last_day.as_slice().to_vec(),
                    components: extra,
                }))
            }
            AgentId::Planner => {
                let green: Vec<f64> = world.miners.iter().map(|m| m.green_score).collect();
                let rel: Vec<f64> = world.miners.iter().map(|m| m.reliability_score).collect();
                let storage: Vec<f64> = world.miners.iter().map(|m| m.total_data).collect();

                let mut endogenous = BTreeMap::new();
                endogenous.insert(
                    GREEN_SCORE_IMPORTANCE.to_string(),
                    world.planner.green_score_importance,
                );
                Some(Observation::Planner(PlannerObservation {
                    obs_version: OBS_VERSION,
                    tick: world.tick,
                    reliability: reliability_aggregate(&rel, &storage),
                    renewables: green_aggregate(&green, &storage),
                    endogenous,
                    components: extra,
                }))
            }
        }
    }

    /// Observations of every agent, miners first.
    pub fn build_all(world: &World, components: &[Component]) -> BTreeMap<AgentId, Self> {
        world
            .agent_ids()
            .filter_map(|id| Self::build(world, components, id).map(|obs| (id, obs)))
            .collect()
    }

    pub fn as_miner(&self) -> Option<&MinerObservation> {
        match self {
            Observation::Miner(m) => Some(m),
            Observation::Planner(_) => None,
        }
    }

    pub fn as_planner(&self) -> Option<&PlannerObservation> {
        match self {
            Observation::Planner(p) => Some(p),
            Observation::Miner(_) => None,
        }
    }
}

/// Serialize to JSON bytes for deterministic comparison.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}
