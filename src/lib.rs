//! Greenfil core library.
//!
//! A stepped multi-agent simulation of decentralized storage miners. Each
//! miner's chance of winning new storage depends on a TotalScore that blends
//! a green score with a reliability score; a planner sets the blend weight and
//! miners can buy renewable energy certificates to raise their green score.
//!
//! Layout, leaf to root:
//! - `endogenous`, `world`: typed per-agent state and the entity registry
//! - `rewards`, `sampling`, `tables`: pure functions, weighted selection,
//!   reset-time distributions
//! - `components`: the planner weight setter and the REC purchase component
//! - `scenario`: storage allocation, energy accounting, rewards, metrics
//! - `env`: reset / step lifecycle over all of the above
//! - `policy`, `runner`, `logging`, `metrics`: driving and recording episodes

pub mod components;
pub mod config;
pub mod endogenous;
pub mod env;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod observation;
pub mod policy;
pub mod rewards;
pub mod runner;
pub mod sampling;
pub mod scenario;
pub mod tables;
pub mod world;

// --- Re-exports for ergonomic external use ---------------------------------

pub use components::{ActionMasks, ActionSet, Component, ComponentKind};

pub use config::{
    ComponentConfig, GreenScoreImportanceConfig, ModelPreset, RecPurchaseConfig, RecPurchaseMode,
    SimConfig, WeightPropagation, ZeroWeightPolicy,
};

pub use endogenous::{Endogenous, MinerState, PlannerState, ScoreWindow, DAY_WINDOW};

pub use env::{EconomyEnv, MaskSet, StepInfo, StepResult};

pub use error::{SimError, SimResult};

pub use logging::{EventSink, FileSink, NoopSink, TickRecord};

pub use metrics::{AgentRewards, RewardLedger, RewardReport};

pub use observation::{to_canonical_json, Observation};

pub use policy::{FixedPolicy, NoopPolicy, Policy, RandomPolicy};

pub use runner::{run_episode, EpisodeConfig, EpisodeSummary, TerminationReason};

pub use world::{AgentClass, AgentId, World};
