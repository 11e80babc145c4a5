// src/error.rs
//
// Error taxonomy for the simulation core.
//
// Every error here is a programming or configuration fault, never a transient
// one: nothing is retried, everything propagates to the caller.

use thiserror::Error;

use crate::components::ComponentKind;
use crate::world::AgentId;

/// Errors raised by components, the scenario engine and config validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// An action index lies outside the declared action space `0..=max`.
    #[error("invalid action {action} for agent {agent} in component {component}: expected 0..={max}")]
    InvalidAction {
        component: ComponentKind,
        agent: AgentId,
        action: usize,
        max: usize,
    },

    /// An action addressed an agent that does not exist or that has no
    /// action space in the named component.
    #[error("no action space for agent {agent} in component {component}")]
    UnknownActor {
        component: ComponentKind,
        agent: AgentId,
    },

    /// Every miner had zero selection weight and the configured policy is `Fail`.
    #[error("all {num_agents} selection weights are zero")]
    NumericDegeneracy { num_agents: usize },

    /// A selection weight was negative or not finite.
    #[error("invalid selection weight {weight} for miner {miner}")]
    InvalidWeight { miner: usize, weight: f64 },

    /// Configuration failed validation.
    #[error("configuration error in '{field}': {message}")]
    Config { field: String, message: String },
}

impl SimError {
    pub(crate) fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
