//! Star topology: reachability only through a central moderator.

use super::{AgentSummary, ParallelGroup};
use crate::types::{AgentId, AgentRole, CommunicationChannel, Phase, TopologyError};

#[derive(Debug, Clone)]
pub struct StarTopology {
    pub agents: Vec<AgentSummary>,
    pub channels: Vec<CommunicationChannel>,
    pub moderator: AgentId,
    pub max_parallelism: usize,
}

impl StarTopology {
    pub fn build(agents: Vec<AgentSummary>) -> Self {
        let moderator = pick_moderator(&agents);
        let channels = build_channels(&agents, moderator);
        Self {
            agents,
            channels,
            moderator,
            max_parallelism: 4,
        }
    }

    pub fn with_max_parallelism(mut self, n: usize) -> Self {
        self.max_parallelism = n.max(1);
        self
    }

    pub fn update_agents(&mut self, agents: Vec<AgentSummary>) {
        self.agents = agents;
    }

    /// Replace the moderator and rebuild channels around the new one.
    pub fn set_moderator(&mut self, moderator: AgentId) -> Result<(), TopologyError> {
        if !self.agents.iter().any(|a| a.id == moderator) {
            return Err(TopologyError::AgentNotFound { agent_id: moderator });
        }
        self.moderator = moderator;
        self.channels = build_channels(&self.agents, moderator);
        Ok(())
    }

    pub fn can_communicate(&self, from: AgentId, to: AgentId) -> bool {
        if from == to {
            return false;
        }
        let known = |id: AgentId| self.agents.iter().any(|a| a.id == id);
        if !known(from) || !known(to) {
            return false;
        }
        from == self.moderator || to == self.moderator
    }

    pub fn targets(&self, from: AgentId) -> Result<Vec<AgentId>, TopologyError> {
        if !self.agents.iter().any(|a| a.id == from) {
            return Err(TopologyError::RoutingFailed(from));
        }
        if from == self.moderator {
            Ok(self
                .agents
                .iter()
                .filter(|a| a.id != self.moderator)
                .map(|a| a.id)
                .collect())
        } else {
            Ok(vec![self.moderator])
        }
    }

    /// Non-moderators batched by `max_parallelism`; moderator is appended to
    /// every batch so results can flow through it.
    pub fn parallel_groups(&self, _phase: Phase) -> Vec<ParallelGroup> {
        let non_moderators: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|a| a.id != self.moderator)
            .map(|a| a.id)
            .collect();

        if non_moderators.is_empty() {
            return vec![vec![self.moderator]];
        }

        non_moderators
            .chunks(self.max_parallelism.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Fixed: the moderator leads every phase.
    pub fn leader(&self, _phase: Phase) -> Result<AgentId, TopologyError> {
        Ok(self.moderator)
    }
}

fn pick_moderator(agents: &[AgentSummary]) -> AgentId {
    agents
        .iter()
        .filter(|a| a.role == AgentRole::Moderator)
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        .or_else(|| {
            agents
                .iter()
                .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        })
        .map(|a| a.id)
        .expect("build is never called with an empty agent list")
}

fn build_channels(agents: &[AgentSummary], moderator: AgentId) -> Vec<CommunicationChannel> {
    agents
        .iter()
        .filter(|a| a.id != moderator)
        .map(|a| CommunicationChannel {
            from: a.id,
            to: moderator,
            bidirectional: true,
            weight: (a.score / 10.0).clamp(0.0, 1.0),
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
    fn non_moderator_targets_are_only_the_moderator() {
        let agents = vec![
            summary(AgentRole::Moderator, 9.0),
            summary(AgentRole::Proposer, 8.0),
            summary(AgentRole::Critic, 7.0),
        ];
        let star = StarTopology::build(agents.clone());
        for a in &agents {
            if a.id == star.moderator {
                continue;
            }
            assert_eq!(star.targets(a.id).unwrap(), vec![star.moderator]);
        }
    }

    #[test]
    fn channel_count_is_n_minus_1() {
        let agents = vec![
            summary(AgentRole::Moderator, 9.0),
            summary(AgentRole::Proposer, 8.0),
            summary(AgentRole::Critic, 7.0),
        ];
        let star = StarTopology::build(agents.clone());
        assert_eq!(star.channels.len(), agents.len() - 1);
    }
}
