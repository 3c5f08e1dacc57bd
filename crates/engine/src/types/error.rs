//! Crate-wide error taxonomy.
//!
//! Each component owns a scoped `thiserror` enum; `EngineError` folds them
//! all together via `#[from]` so callers that don't care about the specific
//! subsystem can propagate with a single `?`.

use super::AgentId;
use thiserror::Error;

/// Top-level error returned by orchestrator-facing operations.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("communication error: {0}")]
    Communication(#[from] CommunicationError),

    #[error("phase error: {0}")]
    Phase(#[from] PhaseError),

    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("provenance error: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("invoker error: {0}")]
    Invoker(#[from] InvokerError),

    #[error("debate cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("insufficient agents: need at least {min}, got {actual}")]
    InsufficientAgents { min: usize, actual: usize },

    #[error("too many agents: allow at most {max}, got {actual}")]
    TooManyAgents { max: usize, actual: usize },

    #[error("unknown topology kind: {0}")]
    UnknownTopology(String),
}

#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("agent not found: {agent_id}")]
    AgentNotFound { agent_id: AgentId },
}

#[derive(Error, Debug, Clone)]
pub enum TopologyError {
    #[error("agent not found: {agent_id}")]
    AgentNotFound { agent_id: AgentId },

    #[error("topology has no agents")]
    Empty,

    #[error("routing failed: sender {0} is not registered")]
    RoutingFailed(AgentId),
}

#[derive(Error, Debug, Clone)]
pub enum CommunicationError {
    #[error("{0} delivery failures")]
    DeliveryFailures(usize),

    #[error("message queue full for agent {agent_id}")]
    QueueFull { agent_id: AgentId },

    #[error("delivery timed out for agent {agent_id}")]
    Timeout { agent_id: AgentId },

    #[error("bus is shut down")]
    ShuttingDown,
}

#[derive(Error, Debug, Clone)]
pub enum PhaseError {
    #[error("all agents failed in phase {phase}")]
    AllAgentsFailed { phase: String },

    #[error("global debate timeout elapsed")]
    GlobalTimeout,

    #[error("debate cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone)]
pub enum PlannerError {
    #[error("no baseline recorded for phase {0}")]
    NoBaseline(String),
}

#[derive(Error, Debug, Clone)]
pub enum GateError {
    #[error("approval request not found: {0}")]
    NotFound(String),

    #[error("approval request not pending: {0}")]
    NotPending(String),

    #[error("approval gate cancelled: {0}")]
    Cancelled(String),
}

#[derive(Error, Debug, Clone)]
pub enum ProvenanceError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

#[derive(Error, Debug, Clone)]
pub enum InvokerError {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("provider call failed: {0}")]
    ProviderCallFailed(String),

    #[error("invocation cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone)]
pub enum SandboxError {
    #[error("no valid tests generated")]
    NoValidTests,

    #[error("execution timeout")]
    Timeout,

    #[error("no container runtime available (docker or podman)")]
    NoRuntime,

    #[error("sandbox process failed: {0}")]
    ProcessFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_non_empty() {
        let errs: Vec<EngineError> = vec![
            EngineError::Cancelled,
            EngineError::Internal("boom".into()),
            EngineError::Configuration(ConfigError::InsufficientAgents { min: 2, actual: 1 }),
            EngineError::Gate(GateError::NotPending("abc".into())),
        ];
        for e in errs {
            assert!(!e.to_string().is_empty());
        }
    }
}
