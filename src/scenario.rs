// src/scenario.rs
//
// Scenario step engine for the storage economy.
//
// Per tick, after every policy component has run:
//   1) draw max(1, N / divisor) miners with replacement, weighted by TotalScore
//   2) NewData = allocation for drawn miners, 0 for the rest
//   3) TotalData += NewData
//   4) ConsumedEnergy = f(NewData, TotalData), appended to the energy window
//
// It also owns the optimization-metric snapshot `M` that turns absolute
// utilities into per-tick rewards (M' - M), and the scalar diagnostics the
// environment exports.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;

use crate::config::{EnergyModel, RevenueModel, SelectionConfig, SimConfig};
use crate::endogenous::{Endogenous, MinerState, ScoreWindow};
use crate::error::SimResult;
use crate::rewards::{
    energy_consumption, green_aggregate, miner_utility, planner_welfare, reliability_aggregate,
};
use crate::sampling::{draw_with_replacement, num_selected, Selection};
use crate::tables::InitTables;
use crate::world::{AgentId, World};

/// Per-agent optimization metric (miners and planner).
pub type MetricSnapshot = BTreeMap<AgentId, f64>;

#[derive(Debug, Clone)]
pub struct ScenarioEngine {
    num_agents: usize,
    selection: SelectionConfig,
    energy: EnergyModel,
    revenue: RevenueModel,
    tables: InitTables,
    /// Metric values as of the end of the previous tick.
    snapshot: MetricSnapshot,
    /// All-zero-weight draws this episode.
    zero_weight_fallbacks: u64,
    last_selection: Vec<usize>,
}

impl ScenarioEngine {
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            num_agents: cfg.num_agents,
            selection: cfg.selection.clone(),
            energy: cfg.energy.clone(),
            revenue: cfg.revenue.clone(),
            tables: cfg.tables.clone(),
            snapshot: MetricSnapshot::new(),
            zero_weight_fallbacks: 0,
            last_selection: Vec::new(),
        }
    }

    /// Re-draw every miner's starting conditions and zero the planner.
    ///
    /// Miners are initialised in index order; each draws a reliability score
    /// and then a location from the tables.
    pub fn reset_agent_states<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        rng: &mut R,
    ) -> SimResult<()> {
        *world = World::new(self.num_agents);
        self.zero_weight_fallbacks = 0;
        self.last_selection.clear();
        self.snapshot.clear();

        for miner in world.miners.iter_mut() {
            let reliability = self.tables.sample_reliability(rng)?;
            let country = self.tables.sample_country(rng)?;

            *miner = MinerState {
                reliability_score: reliability,
                energy_price: country.energy_price_per_kwh,
                initial_green_score: country.renewables_share,
                green_scores_last_day: ScoreWindow::filled(country.renewables_share),
                green_score: country.renewables_share,
                energy_last_day: ScoreWindow::default(),
                ..MinerState::default()
            };
            miner.recompute_total_score(world.planner.green_score_importance);
        }
        Ok(())
    }

    /// Advance storage and energy for one tick.
    ///
    /// Fails without touching the world when the selection weights are
    /// unusable.
    pub fn scenario_step<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        rng: &mut R,
    ) -> SimResult<Selection> {
        let weights: Vec<f64> = world.miners.iter().map(|m| m.total_score).collect();
        let k = num_selected(world.num_miners(), self.selection.divisor);
        let selection =
            draw_with_replacement(&weights, k, self.selection.zero_weight_policy, rng)?;
        if selection.uniform_fallback {
            self.zero_weight_fallbacks += 1;
        }

        for (idx, miner) in world.miners.iter_mut().enumerate() {
            miner.new_data = if selection.contains(idx) {
                self.selection.allocation_bytes
            } else {
                0.0
            };
            miner.total_data += miner.new_data;
            miner.consumed_energy =
                energy_consumption(miner.new_data, miner.total_data, &self.energy);
            miner.energy_last_day.push(miner.consumed_energy);
        }

        debug!(tick = world.tick, draws = ?selection.draws, "storage allocated");
        self.last_selection = selection.draws.clone();
        Ok(selection)
    }

    /// Optimization metric of every agent, planner included.
    pub fn current_metrics(&self, world: &World) -> MetricSnapshot {
        let mut out: MetricSnapshot = world
            .miners
            .iter()
            .enumerate()
            .map(|(idx, m)| (AgentId::Miner(idx), self.miner_metric(m)))
            .collect();
        out.insert(AgentId::Planner, self.planner_metric(world));
        out
    }

    fn miner_metric(&self, m: &MinerState) -> f64 {
        miner_utility(
            m.new_data,
            m.total_data,
            m.energy_price,
            m.recs_price,
            &self.energy,
            &self.revenue,
        )
    }

    fn planner_metric(&self, world: &World) -> f64 {
        let (green, reliability, storage) = columns(world);
        planner_welfare(&green, &reliability, &storage)
    }

    /// Take the reference snapshot rewards are measured against.
    pub fn reset_snapshot(&mut self, world: &World) {
        self.snapshot = self.current_metrics(world);
    }

    pub fn snapshot(&self) -> &MetricSnapshot {
        &self.snapshot
    }

    /// Reward of every agent as the change in its metric since the last
    /// snapshot. The snapshot is replaced.
    pub fn compute_rewards(&mut self, world: &World) -> BTreeMap<AgentId, f64> {
        let current = self.current_metrics(world);
        let rewards = current
            .iter()
            .map(|(id, now)| (*id, now - self.snapshot.get(id).copied().unwrap_or(0.0)))
            .collect();
        self.snapshot = current;
        rewards
    }

    /// Miners drawn on the last scenario step.
    pub fn last_selection(&self) -> &[usize] {
        &self.last_selection
    }

    pub fn zero_weight_fallbacks(&self) -> u64 {
        self.zero_weight_fallbacks
    }

    /// Scalar diagnostics: system aggregates, per-quantity miner averages
    /// and mean utilities.
    pub fn metrics(&self, world: &World) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        let (green, reliability, storage) = columns(world);
        out.insert(
            "system/reliability".to_string(),
            reliability_aggregate(&reliability, &storage),
        );
        out.insert(
            "system/greenness".to_string(),
            green_aggregate(&green, &storage),
        );

        let n = world.num_miners().max(1) as f64;
        for key in Endogenous::ALL {
            if !key.is_scalar() {
                continue;
            }
            let total: f64 = world.miners.iter().filter_map(|m| m.scalar(key)).sum();
            out.insert(format!("endogenous/avg_agent/{}", key.name()), total / n);
        }

        let metrics = self.current_metrics(world);
        let miner_total: f64 = metrics
            .iter()
            .filter(|(id, _)| matches!(id, AgentId::Miner(_)))
            .map(|(_, v)| v)
            .sum();
        out.insert("util/avg_agent".to_string(), miner_total / n);
        out.insert(
            "util/p".to_string(),
            metrics.get(&AgentId::Planner).copied().unwrap_or(0.0),
        );
        out.insert(
            "scenario/zero_weight_fallbacks".to_string(),
            self.zero_weight_fallbacks as f64,
        );
        out
    }
}

fn columns(world: &World) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let green = world.miners.iter().map(|m| m.green_score).collect();
    let reliability = world.miners.iter().map(|m| m.reliability_score).collect();
    let storage = world.miners.iter().map(|m| m.total_data).collect();
    (green, reliability, storage)
}
