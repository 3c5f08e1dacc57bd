//! Chain topology: reachability only to the next-in-chain agent, cyclic.

use super::{AgentSummary, ParallelGroup};
use crate::types::{AgentId, AgentRole, CommunicationChannel, Phase, TopologyError};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ChainTopology {
    pub agents: Vec<AgentSummary>,
    pub order: Vec<AgentId>,
    pub channels: Vec<CommunicationChannel>,
    position: Arc<Mutex<usize>>,
}

const ROLE_ORDER: [AgentRole; 5] = [
    AgentRole::Proposer,
    AgentRole::Critic,
    AgentRole::Reviewer,
    AgentRole::Optimizer,
    AgentRole::Moderator,
];

impl ChainTopology {
    pub fn build(agents: Vec<AgentSummary>) -> Self {
        let order = chain_order(&agents);
        let channels = build_channels(&order);
        Self {
            agents,
            order,
            channels,
            position: Arc::new(Mutex::new(0)),
        }
    }

    pub fn update_agents(&mut self, agents: Vec<AgentSummary>) {
        self.agents = agents;
    }

    pub fn can_communicate(&self, from: AgentId, to: AgentId) -> bool {
        if from == to || self.order.is_empty() {
            return false;
        }
        match self.order.iter().position(|&id| id == from) {
            Some(idx) => self.order[(idx + 1) % self.order.len()] == to,
            None => false,
        }
    }

    pub fn targets(&self, from: AgentId) -> Result<Vec<AgentId>, TopologyError> {
        let idx = self
            .order
            .iter()
            .position(|&id| id == from)
            .ok_or(TopologyError::RoutingFailed(from))?;
        if self.order.len() < 2 {
            return Ok(Vec::new());
        }
        Ok(vec![self.order[(idx + 1) % self.order.len()]])
    }

    /// Each agent is its own group, in chain order: no parallelism.
    pub fn parallel_groups(&self, _phase: Phase) -> Vec<ParallelGroup> {
        self.order.iter().map(|id| vec![*id]).collect()
    }

    /// The agent at the current chain position leads; advances after use.
    pub fn leader(&self, _phase: Phase) -> Result<AgentId, TopologyError> {
        if self.order.is_empty() {
            return Err(TopologyError::Empty);
        }
        let pos = *self.position.lock() % self.order.len();
        Ok(self.order[pos])
    }

    /// Advance the chain pointer by one position, wrapping.
    pub fn advance(&self) {
        if self.order.is_empty() {
            return;
        }
        let mut pos = self.position.lock();
        *pos = (*pos + 1) % self.order.len();
    }

    pub fn current_position(&self) -> usize {
        *self.position.lock()
    }
}

fn chain_order(agents: &[AgentSummary]) -> Vec<AgentId> {
    let mut ordered: Vec<&AgentSummary> = Vec::with_capacity(agents.len());
    for role in ROLE_ORDER {
        let mut matching: Vec<&AgentSummary> = agents.iter().filter(|a| a.role == role).collect();
        matching.sort_by_key(|a| a.id.0);
        ordered.extend(matching);
    }
    let placed: std::collections::HashSet<AgentId> = ordered.iter().map(|a| a.id).collect();
    let mut rest: Vec<&AgentSummary> = agents.iter().filter(|a| !placed.contains(&a.id)).collect();
    rest.sort_by_key(|a| a.id.0);
    ordered.extend(rest);
    ordered.into_iter().map(|a| a.id).collect()
}

fn build_channels(order: &[AgentId]) -> Vec<CommunicationChannel> {
    if order.len() < 2 {
        return Vec::new();
    }
    (0..order.len())
        .map(|i| CommunicationChannel {
            from: order[i],
            to: order[(i + 1) % order.len()],
            bidirectional: false,
            weight: 1.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn summary(role: AgentRole, score: f64) -> AgentSummary {
        AgentSummary {
            id: AgentId(Uuid::new_v4()),
            role,
            score,
            confidence: 0.5,
            specialization: None,
            message_count: 0,
            latency_seconds: 0.0,
        }
    }

    #[test]
    fn n_advances_return_to_position_zero() {
        let agents = vec![
            summary(AgentRole::Proposer, 8.0),
            summary(AgentRole::Critic, 7.0),
            summary(AgentRole::Reviewer, 6.0),
        ];
        let chain = ChainTopology::build(agents.clone());
        assert_eq!(chain.current_position(), 0);
        for _ in 0..agents.len() {
            chain.advance();
        }
        assert_eq!(chain.current_position(), 0);
    }

    #[test]
    fn wraps_from_last_to_first() {
        let agents = vec![
            summary(AgentRole::Proposer, 8.0),
            summary(AgentRole::Critic, 7.0),
        ];
        let chain = ChainTopology::build(agents.clone());
        let last = chain.order[chain.order.len() - 1];
        let first = chain.order[0];
        assert!(chain.can_communicate(last, first));
    }
}
