//! Mesh topology: all-to-all reachability.

use super::{best_by_composite_score, preferred_roles, AgentSummary, ParallelGroup};
use crate::types::{AgentId, CommunicationChannel, Phase, TopologyError};

#[derive(Debug, Clone)]
pub struct MeshTopology {
    pub agents: Vec<AgentSummary>,
    pub channels: Vec<CommunicationChannel>,
}

impl MeshTopology {
    pub fn build(agents: Vec<AgentSummary>) -> Self {
        let channels = build_channels(&agents);
        Self { agents, channels }
    }

    pub fn update_agents(&mut self, agents: Vec<AgentSummary>) {
        self.agents = agents;
    }

    pub fn can_communicate(&self, from: AgentId, to: AgentId) -> bool {
        from != to
            && self.agents.iter().any(|a| a.id == from)
            && self.agents.iter().any(|a| a.id == to)
    }

    pub fn targets(&self, from: AgentId) -> Result<Vec<AgentId>, TopologyError> {
        if !self.agents.iter().any(|a| a.id == from) {
            return Err(TopologyError::RoutingFailed(from));
        }
        Ok(self
            .agents
            .iter()
            .filter(|a| a.id != from)
            .map(|a| a.id)
            .collect())
    }

    /// One group per distinct role active in the phase (preferred roles plus
    /// any continuously-active adversarial role); agents sharing a role run
    /// concurrently as one group.
    pub fn parallel_groups(&self, phase: Phase) -> Vec<ParallelGroup> {
        let preferred = preferred_roles(phase);
        let mut roles: Vec<_> = self
            .agents
            .iter()
            .filter(|a| preferred.contains(&a.role) || a.role.is_continuously_active())
            .map(|a| a.role)
            .collect();
        roles.sort_by_key(|r| format!("{:?}", r));
        roles.dedup();

        if roles.is_empty() {
            // Nothing role-matched this phase: fall back to one group of
            // everyone so the phase still runs.
            return vec![self.agents.iter().map(|a| a.id).collect()];
        }

        roles
            .into_iter()
            .map(|role| {
                self.agents
                    .iter()
                    .filter(|a| a.role == role)
                    .map(|a| a.id)
                    .collect()
            })
            .collect()
    }

    pub fn leader(&self, phase: Phase) -> Result<AgentId, TopologyError> {
        let preferred = preferred_roles(phase);
        let candidates: Vec<&AgentSummary> = self
            .agents
            .iter()
            .filter(|a| preferred.contains(&a.role))
            .collect();
        let pool = if candidates.is_empty() {
            self.agents.iter().collect()
        } else {
            candidates
        };
        best_by_composite_score(pool.into_iter(), phase)
            .map(|a| a.id)
            .ok_or(TopologyError::Empty)
    }
}

fn build_channels(agents: &[AgentSummary]) -> Vec<CommunicationChannel> {
    let mut channels = Vec::with_capacity(agents.len() * agents.len().saturating_sub(1));
    for from in agents {
        for to in agents {
            if from.id == to.id {
                continue;
            }
            let mut weight = (from.score + to.score) / 2.0 / 10.0;
            if from.specialization != to.specialization {
                weight += 0.1;
            }
            if from.role != to.role {
                weight += 0.15;
            }
            channels.push(CommunicationChannel {
                from: from.id,
                to: to.id,
                bidirectional: true,
                weight,
            });
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentRole;
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
    fn channel_count_is_n_times_n_minus_1() {
        let agents = vec![
            summary(AgentRole::Proposer, 8.0),
            summary(AgentRole::Critic, 7.0),
            summary(AgentRole::Reviewer, 6.0),
            summary(AgentRole::Optimizer, 5.0),
        ];
        let mesh = MeshTopology::build(agents.clone());
        assert_eq!(mesh.channels.len(), agents.len() * (agents.len() - 1));
    }

    #[test]
    fn can_communicate_is_symmetric() {
        let agents = vec![summary(AgentRole::Proposer, 8.0), summary(AgentRole::Critic, 7.0)];
        let mesh = MeshTopology::build(agents.clone());
        assert_eq!(
            mesh.can_communicate(agents[0].id, agents[1].id),
            mesh.can_communicate(agents[1].id, agents[0].id)
        );
    }

    #[test]
    fn leader_prefers_phase_role() {
        let agents = vec![
            summary(AgentRole::Proposer, 9.0),
            summary(AgentRole::Critic, 9.9),
        ];
        let mesh = MeshTopology::build(agents.clone());
        // Critic scores higher overall but Proposal prefers Proposer/Architect.
        assert_eq!(mesh.leader(Phase::Proposal).unwrap(), agents[0].id);
    }

    #[test]
    fn routing_from_unknown_sender_fails() {
        let agents = vec![summary(AgentRole::Proposer, 8.0)];
        let mesh = MeshTopology::build(agents);
        let unknown = AgentId(Uuid::new_v4());
        assert!(matches!(
            mesh.targets(unknown),
            Err(TopologyError::RoutingFailed(_))
        ));
    }
}
