//! C2: Topology — who may talk to whom, per-phase parallel groups, and
//! leader selection.
//!
//! Four variants share one interface; modeled as a closed tagged union
//! (rather than an open class hierarchy) per the "dynamic dispatch over
//! topology variants" design note: agents live in the registry's arena and
//! are referenced here by id plus a locally cached summary used for scoring.

pub mod chain;
pub mod mesh;
pub mod star;
pub mod tree;

use crate::types::{Agent, AgentId, AgentRole, CommunicationChannel, Phase, TopologyError};
use serde::{Deserialize, Serialize};

pub use chain::ChainTopology;
pub use mesh::MeshTopology;
pub use star::StarTopology;
pub use tree::TreeTopology;

/// Which topology variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    Mesh,
    Star,
    Chain,
    Tree,
}

/// A locally cached, read-only view of an agent used for topology decisions
/// (leader scoring, role grouping). Refreshed from the registry before each
/// phase rather than held as a live reference, so the topology never has to
/// lock the registry while it reasons about structure.
#[derive(Debug, Clone)]
pub struct AgentSummary {
    pub id: AgentId,
    pub role: AgentRole,
    pub score: f64,
    pub confidence: f64,
    pub specialization: Option<String>,
    pub message_count: u64,
    pub latency_seconds: f64,
}

impl From<&Agent> for AgentSummary {
    fn from(a: &Agent) -> Self {
        Self {
            id: a.id,
            role: a.role,
            score: a.score,
            confidence: a.confidence,
            specialization: a.specialization.clone(),
            message_count: a.metrics.message_count,
            latency_seconds: a.latency_seconds(),
        }
    }
}

/// Roles a phase prefers when scoring a leader or emphasizing refinements.
pub fn preferred_roles(phase: Phase) -> &'static [AgentRole] {
    match phase {
        Phase::Dehallucination => &[AgentRole::Validator],
        Phase::SelfEvolvement => &[AgentRole::Teacher],
        Phase::Proposal => &[AgentRole::Proposer, AgentRole::Architect],
        Phase::Critique => &[AgentRole::Critic, AgentRole::RedTeam],
        Phase::Review => &[AgentRole::Reviewer],
        Phase::Optimization => &[AgentRole::Optimizer, AgentRole::PerformanceAnalyzer],
        Phase::Adversarial => &[AgentRole::RedTeam, AgentRole::BlueTeam, AgentRole::Security],
        Phase::Convergence => &[AgentRole::Moderator],
    }
}

/// A set of agents that may be invoked concurrently within one phase.
pub type ParallelGroup = Vec<AgentId>;

/// Snapshot of topology-wide counters, exposed for observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyMetrics {
    pub agent_count: usize,
    pub channel_count: usize,
    pub broadcast_count: u64,
}

/// The closed tagged union over the four topology variants.
#[derive(Debug, Clone)]
pub enum Topology {
    Mesh(MeshTopology),
    Star(StarTopology),
    Chain(ChainTopology),
    Tree(TreeTopology),
}

impl Topology {
    pub fn build(kind: TopologyKind, agents: &[Agent]) -> Result<Self, TopologyError> {
        if agents.is_empty() {
            return Err(TopologyError::Empty);
        }
        let summaries: Vec<AgentSummary> = agents.iter().map(AgentSummary::from).collect();
        Ok(match kind {
            TopologyKind::Mesh => Topology::Mesh(MeshTopology::build(summaries)),
            TopologyKind::Star => Topology::Star(StarTopology::build(summaries)),
            TopologyKind::Chain => Topology::Chain(ChainTopology::build(summaries)),
            TopologyKind::Tree => Topology::Tree(TreeTopology::build(summaries)?),
        })
    }

    pub fn kind(&self) -> TopologyKind {
        match self {
            Topology::Mesh(_) => TopologyKind::Mesh,
            Topology::Star(_) => TopologyKind::Star,
            Topology::Chain(_) => TopologyKind::Chain,
            Topology::Tree(_) => TopologyKind::Tree,
        }
    }

    /// Refresh the cached agent summaries used for scoring, without
    /// rebuilding the channel list (channels rebuild only on init/rebalance).
    pub fn update_agents(&mut self, agents: &[Agent]) {
        let summaries: Vec<AgentSummary> = agents.iter().map(AgentSummary::from).collect();
        match self {
            Topology::Mesh(t) => t.update_agents(summaries),
            Topology::Star(t) => t.update_agents(summaries),
            Topology::Chain(t) => t.update_agents(summaries),
            Topology::Tree(t) => t.update_agents(summaries),
        }
    }

    pub fn can_communicate(&self, from: AgentId, to: AgentId) -> bool {
        match self {
            Topology::Mesh(t) => t.can_communicate(from, to),
            Topology::Star(t) => t.can_communicate(from, to),
            Topology::Chain(t) => t.can_communicate(from, to),
            Topology::Tree(t) => t.can_communicate(from, to),
        }
    }

    pub fn targets(&self, from: AgentId) -> Result<Vec<AgentId>, TopologyError> {
        match self {
            Topology::Mesh(t) => t.targets(from),
            Topology::Star(t) => t.targets(from),
            Topology::Chain(t) => t.targets(from),
            Topology::Tree(t) => t.targets(from),
        }
    }

    pub fn parallel_groups(&self, phase: Phase) -> Vec<ParallelGroup> {
        match self {
            Topology::Mesh(t) => t.parallel_groups(phase),
            Topology::Star(t) => t.parallel_groups(phase),
            Topology::Chain(t) => t.parallel_groups(phase),
            Topology::Tree(t) => t.parallel_groups(phase),
        }
    }

    pub fn leader(&self, phase: Phase) -> Result<AgentId, TopologyError> {
        match self {
            Topology::Mesh(t) => t.leader(phase),
            Topology::Star(t) => t.leader(phase),
            Topology::Chain(t) => t.leader(phase),
            Topology::Tree(t) => t.leader(phase),
        }
    }

    pub fn channels(&self) -> &[CommunicationChannel] {
        match self {
            Topology::Mesh(t) => &t.channels,
            Topology::Star(t) => &t.channels,
            Topology::Chain(t) => &t.channels,
            Topology::Tree(t) => &t.channels,
        }
    }

    pub fn metrics(&self) -> TopologyMetrics {
        let agent_count = match self {
            Topology::Mesh(t) => t.agents.len(),
            Topology::Star(t) => t.agents.len(),
            Topology::Chain(t) => t.agents.len(),
            Topology::Tree(t) => t.agents.len(),
        };
        TopologyMetrics {
            agent_count,
            channel_count: self.channels().len(),
            broadcast_count: 0,
        }
    }

    /// Dynamic role reassignment: rank agents by `score - latency_seconds +
    /// 0.1*message_count`; top quartile promoted to `Validator` if not
    /// already a leader role. Returns the ids promoted.
    pub fn reassign_dynamic_roles(&self) -> Vec<AgentId> {
        let summaries: Vec<&AgentSummary> = match self {
            Topology::Mesh(t) => t.agents.iter().collect(),
            Topology::Star(t) => t.agents.iter().collect(),
            Topology::Chain(t) => t.agents.iter().collect(),
            Topology::Tree(t) => t.agents.iter().collect(),
        };
        dynamic_role_candidates(&summaries)
    }

    /// Tree-only: remove a failed node, promote/redistribute, rebuild
    /// channels. Fails with `AgentNotFound` for any other variant or an
    /// unknown id.
    pub fn rebalance(&mut self, failed: AgentId) -> Result<(), TopologyError> {
        match self {
            Topology::Tree(t) => t.rebalance(failed),
            _ => Err(TopologyError::AgentNotFound { agent_id: failed }),
        }
    }
}

fn dynamic_role_candidates(agents: &[&AgentSummary]) -> Vec<AgentId> {
    if agents.is_empty() {
        return Vec::new();
    }
    let mut ranked: Vec<(&&AgentSummary, f64)> = agents
        .iter()
        .map(|a| {
            let rank = a.score - a.latency_seconds + 0.1 * a.message_count as f64;
            (a, rank)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let quartile = (ranked.len() as f64 / 4.0).ceil().max(1.0) as usize;
    ranked
        .into_iter()
        .take(quartile)
        .filter(|(a, _)| !is_leader_role(a.role))
        .map(|(a, _)| a.id)
        .collect()
}

fn is_leader_role(role: AgentRole) -> bool {
    matches!(
        role,
        AgentRole::Moderator | AgentRole::Architect | AgentRole::Validator
    )
}

/// Composite leader score shared by variants that rank candidates by
/// weighted heuristics (Mesh, Tree fallback): base score + role bonus (0.2
/// if preferred for phase) + specialization bonus (0.15 if the
/// specialization tag contains the phase name) + activity bonus
/// (min(0.1, message_count*0.01)) + confidence*0.1.
pub fn composite_leader_score(agent: &AgentSummary, phase: Phase) -> f64 {
    let role_bonus = if preferred_roles(phase).contains(&agent.role) {
        0.2
    } else {
        0.0
    };
    let spec_bonus = agent
        .specialization
        .as_deref()
        .map(|s| s.to_lowercase().contains(phase.as_str()))
        .unwrap_or(false)
        .then_some(0.15)
        .unwrap_or(0.0);
    let activity_bonus = (agent.message_count as f64 * 0.01).min(0.1);
    agent.score + role_bonus + spec_bonus + activity_bonus + agent.confidence * 0.1
}

/// Pick the agent with the highest composite score, breaking ties by id for
/// determinism.
pub fn best_by_composite_score<'a>(
    agents: impl Iterator<Item = &'a AgentSummary>,
    phase: Phase,
) -> Option<&'a AgentSummary> {
    agents.max_by(|a, b| {
        let sa = composite_leader_score(a, phase);
        let sb = composite_leader_score(b, phase);
        sa.partial_cmp(&sb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.0.cmp(&b.id.0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Agent;

    fn agent(role: AgentRole, score: f64) -> Agent {
        Agent::new(role, "p", "m").with_score(score)
    }

    #[test]
    fn build_rejects_empty() {
        assert!(matches!(
            Topology::build(TopologyKind::Mesh, &[]),
            Err(TopologyError::Empty)
        ));
    }

    #[test]
    fn no_self_edges_for_any_kind() {
        let agents = vec![
            agent(AgentRole::Proposer, 8.0),
            agent(AgentRole::Critic, 7.0),
            agent(AgentRole::Reviewer, 6.0),
        ];
        for kind in [
            TopologyKind::Mesh,
            TopologyKind::Star,
            TopologyKind::Chain,
            TopologyKind::Tree,
        ] {
            let topo = Topology::build(kind, &agents).unwrap();
            for a in &agents {
                let targets = topo.targets(a.id).unwrap_or_default();
                assert!(!targets.contains(&a.id), "{:?} has a self-edge", kind);
            }
        }
    }
}
