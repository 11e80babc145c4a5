// src/runner.rs
//
// Episode runner with deterministic episode mechanics.
//
// run_episode resets the environment with the episode seed, lets a policy
// choose actions from the current observations and masks, steps until the
// episode ends (or `max_ticks` is hit), streams one TickRecord per tick to an
// EventSink, and returns an EpisodeSummary.
//
// The summary carries a SHA-256 checksum over the per-tick selections and
// rewards, so two runs can be compared for determinism with one string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::env::EconomyEnv;
use crate::error::SimResult;
use crate::logging::{EventSink, TickRecord};
use crate::metrics::{RewardLedger, RewardReport};
use crate::policy::Policy;
use crate::scenario::MetricSnapshot;
use crate::world::AgentId;

/// Episode termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The environment reached its configured episode length.
    EndOfEpisode,
    /// The runner stopped at `EpisodeConfig::max_ticks`.
    MaxTicks,
}

/// Configuration for one episode.
#[derive(Debug, Clone, Default)]
pub struct EpisodeConfig {
    /// Random seed for deterministic simulation.
    pub seed: u64,
    /// Episode ID for logging.
    pub episode_id: u64,
    /// Stop early after this many ticks; None runs to the episode length.
    pub max_ticks: Option<u64>,
}

impl EpisodeConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_episode_id(mut self, episode_id: u64) -> Self {
        self.episode_id = episode_id;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }
}

/// Summary of a completed episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode_id: u64,
    pub seed: u64,
    pub policy_version: String,
    pub termination_reason: TerminationReason,
    pub total_ticks: u64,
    /// Sum of per-tick rewards for every agent.
    pub total_rewards: BTreeMap<AgentId, f64>,
    /// Optimization metrics right after reset.
    pub initial_optimization_metrics: MetricSnapshot,
    /// Optimization metrics after the last tick.
    pub final_optimization_metrics: MetricSnapshot,
    /// Scalar diagnostics after the last tick.
    pub final_metrics: BTreeMap<String, f64>,
    /// Per-agent reward breakdown.
    pub rewards: RewardReport,
    /// Ticks on which selection fell back to uniform draws.
    pub uniform_fallbacks: u64,
    /// Hex-encoded SHA-256 over per-tick selections and rewards.
    pub checksum: String,
}

/// Run a complete episode of `env` driven by `policy`.
pub fn run_episode<P, S>(
    env: &mut EconomyEnv,
    policy: &mut P,
    sink: &mut S,
    config: &EpisodeConfig,
) -> SimResult<EpisodeSummary>
where
    P: Policy + ?Sized,
    S: EventSink + ?Sized,
{
    let mut observations = env.reset(Some(config.seed))?;
    policy.reset_episode(config.seed, config.episode_id);
    let initial_optimization_metrics = env.optimization_metrics();
    let mut masks = env.compute_masks();

    info!(
        episode_id = config.episode_id,
        seed = config.seed,
        policy = policy.version(),
        "episode start"
    );

    let mut hasher = Sha256::new();
    hasher.update(config.seed.to_le_bytes());

    let mut ledger = RewardLedger::for_agents(env.world().agent_ids());
    let mut uniform_fallbacks = 0;
    let mut ticks: u64 = 0;

    let termination_reason = loop {
        if env.is_done() {
            break TerminationReason::EndOfEpisode;
        }
        if config.max_ticks.is_some_and(|max| ticks >= max) {
            break TerminationReason::MaxTicks;
        }

        let actions = policy.act(&observations, &masks);
        let result = env.step(&actions)?;
        ticks += 1;

        ledger.record_tick(result.info.tick, &result.rewards);
        if result.info.uniform_fallback {
            uniform_fallbacks += 1;
        }

        update_checksum(&mut hasher, result.info.tick, &result.info.selected, &result.rewards);

        let metrics = env.compute_metrics();
        sink.log_tick(&TickRecord {
            episode_id: config.episode_id,
            tick: result.info.tick,
            green_score_importance: result.info.green_score_importance,
            selected: &result.info.selected,
            rewards: &result.rewards,
            metrics: &metrics,
        });

        observations = result.observations;
        masks = result.masks;
    };
    sink.flush();

    let summary = EpisodeSummary {
        episode_id: config.episode_id,
        seed: config.seed,
        policy_version: policy.version().to_string(),
        termination_reason,
        total_ticks: ticks,
        total_rewards: ledger.totals(),
        initial_optimization_metrics,
        final_optimization_metrics: env.optimization_metrics(),
        final_metrics: env.compute_metrics(),
        rewards: ledger.report(),
        uniform_fallbacks,
        checksum: hex_encode(&hasher.finalize()),
    };

    info!(
        episode_id = summary.episode_id,
        ticks = summary.total_ticks,
        reason = ?summary.termination_reason,
        planner_total = summary.total_rewards.get(&AgentId::Planner).copied().unwrap_or(0.0),
        "episode end"
    );
    Ok(summary)
}

fn update_checksum(
    hasher: &mut Sha256,
    tick: u64,
    selected: &[usize],
    rewards: &BTreeMap<AgentId, f64>,
) {
    hasher.update(tick.to_le_bytes());
    for idx in selected {
        hasher.update((*idx as u64).to_le_bytes());
    }
    // Fixed precision keeps the digest stable across float formatting.
    for (id, r) in rewards {
        hasher.update(id.to_string().as_bytes());
        hasher.update(((r * 1e9).round() as i64).to_le_bytes());
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
