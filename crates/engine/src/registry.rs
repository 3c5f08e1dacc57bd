//! C1: Agent registry — process-wide mapping from agent id to capabilities.

use crate::types::{Agent, AgentId, RegistryError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Thread-safe, process-wide registry of agents. Shared by `Arc` across
/// debates; agents are looked up by id, mutated in place (role, confidence,
/// metrics), and never removed except through explicit `deregister`.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Arc<DashMap<AgentId, Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(DashMap::new()),
        }
    }

    /// Register a new agent, returning its id.
    pub fn register(&self, agent: Agent) -> AgentId {
        let id = agent.id;
        debug!(agent_id = %id, role = ?agent.role, "registering agent");
        self.agents.insert(id, agent);
        id
    }

    pub fn deregister(&self, id: AgentId) -> bool {
        self.agents.remove(&id).is_some()
    }

    pub fn get(&self, id: AgentId) -> Result<Agent, RegistryError> {
        self.agents
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::AgentNotFound { agent_id: id })
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Snapshot of every registered agent, in arbitrary order.
    pub fn all(&self) -> Vec<Agent> {
        self.agents.iter().map(|e| e.value().clone()).collect()
    }

    /// Build a team of `n` agents matching the given ids, failing if any id
    /// is unknown.
    pub fn team(&self, ids: &[AgentId]) -> Result<Vec<Agent>, RegistryError> {
        ids.iter().map(|id| self.get(*id)).collect()
    }

    pub fn set_role(&self, id: AgentId, role: crate::types::AgentRole) -> Result<(), RegistryError> {
        let mut entry = self
            .agents
            .get_mut(&id)
            .ok_or(RegistryError::AgentNotFound { agent_id: id })?;
        entry.role = role;
        Ok(())
    }

    pub fn set_confidence(&self, id: AgentId, confidence: f64) -> Result<(), RegistryError> {
        let mut entry = self
            .agents
            .get_mut(&id)
            .ok_or(RegistryError::AgentNotFound { agent_id: id })?;
        entry.confidence = confidence.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn record_metrics(&self, id: AgentId, latency: Duration) -> Result<(), RegistryError> {
        let mut entry = self
            .agents
            .get_mut(&id)
            .ok_or(RegistryError::AgentNotFound { agent_id: id })?;
        entry.metrics.record(latency);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agent, AgentRole};

    #[test]
    fn register_and_get() {
        let registry = AgentRegistry::new();
        let agent = Agent::new(AgentRole::Proposer, "openai", "gpt-4");
        let id = registry.register(agent.clone());
        let fetched = registry.get(id).unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.provider, "openai");
    }

    #[test]
    fn get_missing_fails() {
        let registry = AgentRegistry::new();
        let err = registry.get(AgentId::new()).unwrap_err();
        assert!(matches!(err, RegistryError::AgentNotFound { .. }));
    }

    #[test]
    fn team_requires_all_present() {
        let registry = AgentRegistry::new();
        let a = registry.register(Agent::new(AgentRole::Proposer, "p", "m"));
        let missing = AgentId::new();
        assert!(registry.team(&[a]).is_ok());
        assert!(registry.team(&[a, missing]).is_err());
    }

    #[test]
    fn set_role_mutates_in_place() {
        let registry = AgentRegistry::new();
        let id = registry.register(Agent::new(AgentRole::Proposer, "p", "m"));
        registry.set_role(id, AgentRole::Validator).unwrap();
        assert_eq!(registry.get(id).unwrap().role, AgentRole::Validator);
    }
}
