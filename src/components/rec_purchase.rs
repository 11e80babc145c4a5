// src/components/rec_purchase.rs
//
// Agent-side component: miners buy renewable energy certificates (RECs).
//
// Each package covers 5% of the miner's consumed energy. Buying raises the
// instantaneous green score above the location's renewable share (capped
// at 1.0); the green score itself is an aggregate over the last day.
// Every level is legal on every tick.

use rand::Rng;

use crate::config::{RecPurchaseConfig, RecPurchaseMode};
use crate::error::SimResult;
use crate::world::{AgentClass, AgentId, World};

use super::{check_action, ActionMasks, ActionSet, ComponentKind};

/// Share of consumed energy covered by one package.
pub const PACKAGE_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct RecPurchase {
    cfg: RecPurchaseConfig,
    /// Coverage bought by each miner on the last applied tick.
    last_percentages: Vec<f64>,
}

impl RecPurchase {
    pub fn new(cfg: RecPurchaseConfig) -> Self {
        Self {
            cfg,
            last_percentages: Vec::new(),
        }
    }

    pub fn config(&self) -> &RecPurchaseConfig {
        &self.cfg
    }

    pub fn n_actions(&self, class: AgentClass) -> Option<usize> {
        match class {
            AgentClass::Miner => Some(self.cfg.packages),
            AgentClass::Planner => None,
        }
    }

    /// Energy coverage bought by action `a`.
    pub fn recs_percentage(&self, action: usize) -> f64 {
        let packages = match self.cfg.mode {
            RecPurchaseMode::Flat => action,
            RecPurchaseMode::EnergyWeighted => action.saturating_sub(1),
        };
        packages as f64 * PACKAGE_FRACTION
    }

    /// Weight blended into TotalScore: the static override if configured,
    /// else the planner's live weight.
    pub fn effective_weight(&self, world: &World) -> f64 {
        self.cfg
            .static_importance
            .unwrap_or(world.planner.green_score_importance)
    }

    pub fn reset(&mut self, world: &mut World) {
        self.last_percentages = vec![0.0; world.num_miners()];
        let w = self.effective_weight(world);
        for miner in world.miners.iter_mut() {
            miner.recompute_total_score(w);
        }
    }

    pub fn generate_masks(&self, world: &World) -> ActionMasks {
        (0..world.num_miners())
            .map(|idx| (AgentId::Miner(idx), vec![true; self.cfg.packages + 1]))
            .collect()
    }

    pub fn component_step<R: Rng + ?Sized>(
        &mut self,
        world: &mut World,
        actions: &ActionSet,
        rng: &mut R,
    ) -> SimResult<()> {
        let kind = ComponentKind::RecPurchase;

        // Reject the whole step before any miner is touched.
        for idx in 0..world.num_miners() {
            let agent = AgentId::Miner(idx);
            check_action(kind, agent, actions.get(agent, kind), self.cfg.packages)?;
        }

        let weight = self.effective_weight(world);
        self.last_percentages.resize(world.num_miners(), 0.0);

        for idx in world.random_order(rng) {
            let pct = self.recs_percentage(actions.get(AgentId::Miner(idx), kind));
            let miner = &mut world.miners[idx];

            let instant = (miner.initial_green_score + pct).min(1.0);
            miner.green_scores_last_day.push(instant);
            let green = match self.cfg.mode {
                RecPurchaseMode::Flat => miner.green_scores_last_day.mean(),
                RecPurchaseMode::EnergyWeighted => miner
                    .green_scores_last_day
                    .weighted_mean(&miner.energy_last_day),
            };
            miner.green_score = green.clamp(0.0, 1.0);
            miner.recs_price = self.cfg.rec_price * miner.consumed_energy * pct;
            miner.recompute_total_score(weight);

            self.last_percentages[idx] = pct;
        }
        Ok(())
    }

    pub fn metrics(&self, world: &World) -> Vec<(String, f64)> {
        let avg_pct = if self.last_percentages.is_empty() {
            0.0
        } else {
            self.last_percentages.iter().sum::<f64>() / self.last_percentages.len() as f64
        };
        let total_price: f64 = world.miners.iter().map(|m| m.recs_price).sum();
        vec![
            ("rec_purchase/avg_recs_percentage".to_string(), avg_pct),
            ("rec_purchase/total_recs_price".to_string(), total_price),
        ]
    }

    pub fn observation_fields(&self, agent: AgentId) -> Vec<(String, f64)> {
        match agent {
            AgentId::Miner(_) => vec![("rec_price".to_string(), self.cfg.rec_price)],
            AgentId::Planner => Vec::new(),
        }
    }
}
