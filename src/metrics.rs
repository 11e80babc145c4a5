// src/metrics.rs
//
// Per-agent reward accounting for episode summaries.
//
// A `RewardLedger` is filled by the runner with each tick's reward map. It
// keeps, for every agent, the cumulative reward plus the tick and value of
// its best and worst step, and counts how often a miner's step reward was
// positive. `report()` freezes the ledger into a serializable `RewardReport`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::world::AgentId;

/// Extremum of one agent's per-tick reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickReward {
    pub tick: u64,
    pub reward: f64,
}

/// Running totals for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRewards {
    pub total: f64,
    pub ticks: u64,
    /// Ticks on which the reward was strictly positive.
    pub positive_ticks: u64,
    pub best: Option<TickReward>,
    pub worst: Option<TickReward>,
}

impl AgentRewards {
    fn new() -> Self {
        Self {
            total: 0.0,
            ticks: 0,
            positive_ticks: 0,
            best: None,
            worst: None,
        }
    }

    fn record(&mut self, tick: u64, reward: f64) {
        self.total += reward;
        self.ticks += 1;
        if reward > 0.0 {
            self.positive_ticks += 1;
        }
        if self.best.map_or(true, |b| reward > b.reward) {
            self.best = Some(TickReward { tick, reward });
        }
        if self.worst.map_or(true, |w| reward < w.reward) {
            self.worst = Some(TickReward { tick, reward });
        }
    }

    pub fn mean(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.total / self.ticks as f64
        }
    }
}

/// Reward accumulator keyed by agent.
#[derive(Debug, Clone, Default)]
pub struct RewardLedger {
    agents: BTreeMap<AgentId, AgentRewards>,
}

impl RewardLedger {
    /// Ledger with a zeroed entry for each of `ids`, so agents that never
    /// receive a reward still appear in the report.
    pub fn for_agents(ids: impl IntoIterator<Item = AgentId>) -> Self {
        Self {
            agents: ids.into_iter().map(|id| (id, AgentRewards::new())).collect(),
        }
    }

    /// Record one tick's rewards. Non-finite rewards are skipped.
    pub fn record_tick(&mut self, tick: u64, rewards: &BTreeMap<AgentId, f64>) {
        for (id, r) in rewards {
            if !r.is_finite() {
                continue;
            }
            self.agents
                .entry(*id)
                .or_insert_with(AgentRewards::new)
                .record(tick, *r);
        }
    }

    pub fn get(&self, id: &AgentId) -> Option<&AgentRewards> {
        self.agents.get(id)
    }

    pub fn totals(&self) -> BTreeMap<AgentId, f64> {
        self.agents.iter().map(|(id, a)| (*id, a.total)).collect()
    }

    pub fn report(&self) -> RewardReport {
        let miners: Vec<(&AgentId, &AgentRewards)> = self
            .agents
            .iter()
            .filter(|(id, _)| matches!(id, AgentId::Miner(_)))
            .collect();

        let mean_miner_total = if miners.is_empty() {
            0.0
        } else {
            miners.iter().map(|(_, a)| a.total).sum::<f64>() / miners.len() as f64
        };
        // Ties go to the lowest index.
        let top_miner = miners
            .iter()
            .fold(None::<(AgentId, f64)>, |acc, (id, a)| match acc {
                Some((_, best)) if best >= a.total => acc,
                _ => Some((**id, a.total)),
            })
            .map(|(id, _)| id);

        RewardReport {
            planner: self.agents.get(&AgentId::Planner).cloned(),
            mean_miner_total,
            top_miner,
            per_agent: self.agents.clone(),
        }
    }
}

/// Frozen view of a `RewardLedger`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardReport {
    pub planner: Option<AgentRewards>,
    /// Average cumulative reward across miners.
    pub mean_miner_total: f64,
    /// Miner with the highest cumulative reward.
    pub top_miner: Option<AgentId>,
    pub per_agent: BTreeMap<AgentId, AgentRewards>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewards(entries: &[(AgentId, f64)]) -> BTreeMap<AgentId, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_empty_ledger_lists_every_agent() {
        let ledger = RewardLedger::for_agents([AgentId::Planner, AgentId::Miner(0)]);
        let report = ledger.report();
        assert_eq!(report.per_agent.len(), 2);
        assert_eq!(report.mean_miner_total, 0.0);
        assert_eq!(report.top_miner, Some(AgentId::Miner(0)));
        let planner = report.planner.unwrap();
        assert_eq!(planner.ticks, 0);
        assert_eq!(planner.mean(), 0.0);
        assert!(planner.best.is_none());
    }

    #[test]
    fn test_best_worst_and_positive_ticks() {
        let mut ledger = RewardLedger::for_agents([AgentId::Miner(0), AgentId::Miner(1)]);
        ledger.record_tick(0, &rewards(&[(AgentId::Miner(0), 1.5), (AgentId::Miner(1), -0.5)]));
        ledger.record_tick(1, &rewards(&[(AgentId::Miner(0), -2.0), (AgentId::Miner(1), 0.0)]));
        ledger.record_tick(2, &rewards(&[(AgentId::Miner(0), 3.0), (AgentId::Miner(1), 0.25)]));

        let m0 = ledger.get(&AgentId::Miner(0)).unwrap();
        assert_eq!(m0.ticks, 3);
        assert_eq!(m0.positive_ticks, 2);
        assert_eq!(m0.total, 2.5);
        assert_eq!(m0.best, Some(TickReward { tick: 2, reward: 3.0 }));
        assert_eq!(m0.worst, Some(TickReward { tick: 1, reward: -2.0 }));

        let report = ledger.report();
        assert_eq!(report.top_miner, Some(AgentId::Miner(0)));
        assert!((report.mean_miner_total - (2.5 - 0.25) / 2.0).abs() < 1e-12);
        assert!(report.planner.is_none());
    }

    #[test]
    fn test_non_finite_rewards_skipped() {
        let mut ledger = RewardLedger::for_agents([AgentId::Planner]);
        ledger.record_tick(0, &rewards(&[(AgentId::Planner, 1.0)]));
        ledger.record_tick(1, &rewards(&[(AgentId::Planner, f64::NAN)]));
        assert_eq!(ledger.get(&AgentId::Planner).unwrap().ticks, 1);
        assert_eq!(ledger.totals()[&AgentId::Planner], 1.0);
    }
}
