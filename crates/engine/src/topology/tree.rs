//! Tree topology: a root moderator, level-1 role leads, level-2 followers
//! attached round-robin. Rebalances on node failure by redistributing orphans.

use super::{composite_leader_score, preferred_roles, AgentSummary, ParallelGroup};
use crate::types::{AgentId, AgentRole, CommunicationChannel, Phase, TopologyError};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TreeTopology {
    pub agents: Vec<AgentSummary>,
    pub root: AgentId,
    /// Level-1 leads, one per distinct preferred role represented.
    pub leads: Vec<AgentId>,
    /// Maps a level-2 follower to the lead it reports to.
    pub parent_of: HashMap<AgentId, AgentId>,
    pub channels: Vec<CommunicationChannel>,
}

impl TreeTopology {
    pub fn build(agents: Vec<AgentSummary>) -> Result<Self, TopologyError> {
        if agents.is_empty() {
            return Err(TopologyError::Empty);
        }
        let root = pick_root(&agents);
        let leads = pick_leads(&agents, root);
        let parent_of = attach_followers(&agents, root, &leads);
        let channels = build_channels(root, &leads, &parent_of);
        Ok(Self {
            agents,
            root,
            leads,
            parent_of,
            channels,
        })
    }

    pub fn update_agents(&mut self, agents: Vec<AgentSummary>) {
        self.agents = agents;
    }

    pub fn can_communicate(&self, from: AgentId, to: AgentId) -> bool {
        if from == to {
            return false;
        }
        if from == self.root || to == self.root {
            return self.known(from) && self.known(to);
        }
        if self.leads.contains(&from) && self.parent_of.get(&to) == Some(&from) {
            return true;
        }
        if self.leads.contains(&to) && self.parent_of.get(&from) == Some(&to) {
            return true;
        }
        false
    }

    pub fn targets(&self, from: AgentId) -> Result<Vec<AgentId>, TopologyError> {
        if !self.known(from) {
            return Err(TopologyError::RoutingFailed(from));
        }
        if from == self.root {
            return Ok(self.leads.clone());
        }
        if self.leads.contains(&from) {
            let mut t: Vec<AgentId> = self
                .parent_of
                .iter()
                .filter(|(_, parent)| **parent == from)
                .map(|(child, _)| *child)
                .collect();
            t.push(self.root);
            return Ok(t);
        }
        match self.parent_of.get(&from) {
            Some(parent) => Ok(vec![*parent]),
            None => Ok(vec![self.root]),
        }
    }

    /// Root alone, then each lead with its followers as independent groups.
    pub fn parallel_groups(&self, _phase: Phase) -> Vec<ParallelGroup> {
        let mut groups = vec![vec![self.root]];
        for &lead in &self.leads {
            let mut group = vec![lead];
            group.extend(
                self.parent_of
                    .iter()
                    .filter(|(_, parent)| **parent == lead)
                    .map(|(child, _)| *child),
            );
            groups.push(group);
        }
        groups
    }

    pub fn leader(&self, phase: Phase) -> Result<AgentId, TopologyError> {
        let preferred = preferred_roles(phase);
        let lead_summaries: Vec<&AgentSummary> = self
            .agents
            .iter()
            .filter(|a| self.leads.contains(&a.id) && preferred.contains(&a.role))
            .collect();
        if let Some(best) = super::best_by_composite_score(lead_summaries.into_iter(), phase) {
            return Ok(best.id);
        }
        Ok(self.root)
    }

    fn known(&self, id: AgentId) -> bool {
        self.agents.iter().any(|a| a.id == id)
    }

    /// Remove a failed node, redistribute its followers, rebuild channels.
    /// Only implemented topology variant that supports rebalancing.
    pub fn rebalance(&mut self, failed: AgentId) -> Result<(), TopologyError> {
        if !self.known(failed) {
            return Err(TopologyError::AgentNotFound { agent_id: failed });
        }
        self.agents.retain(|a| a.id != failed);

        if failed == self.root {
            if self.leads.is_empty() {
                // No children to promote; nothing left to rebalance onto.
                let remaining = self.agents.clone();
                let rebuilt = TreeTopology::build(remaining)?;
                *self = rebuilt;
                return Ok(());
            }

            let new_root = self.leads.remove(0);
            let orphans: Vec<AgentId> = self
                .parent_of
                .iter()
                .filter(|(_, parent)| **parent == new_root)
                .map(|(child, _)| *child)
                .collect();
            for orphan in &orphans {
                self.parent_of.remove(orphan);
            }
            for (i, orphan) in orphans.into_iter().enumerate() {
                if self.leads.is_empty() {
                    self.parent_of.insert(orphan, new_root);
                } else {
                    let new_parent = self.leads[i % self.leads.len()];
                    self.parent_of.insert(orphan, new_parent);
                }
            }
            self.parent_of.remove(&new_root);
            self.root = new_root;
            self.channels = build_channels(self.root, &self.leads, &self.parent_of);
            return Ok(());
        }

        if let Some(pos) = self.leads.iter().position(|&id| id == failed) {
            self.leads.remove(pos);
            let orphans: Vec<AgentId> = self
                .parent_of
                .iter()
                .filter(|(_, parent)| **parent == failed)
                .map(|(child, _)| *child)
                .collect();
            for (i, orphan) in orphans.into_iter().enumerate() {
                if self.leads.is_empty() {
                    self.parent_of.remove(&orphan);
                } else {
                    let new_parent = self.leads[i % self.leads.len()];
                    self.parent_of.insert(orphan, new_parent);
                }
            }
        } else {
            self.parent_of.remove(&failed);
        }

        self.channels = build_channels(self.root, &self.leads, &self.parent_of);
        Ok(())
    }
}

fn pick_root(agents: &[AgentSummary]) -> AgentId {
    let by_score = |a: &&AgentSummary, b: &&AgentSummary| {
        a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal)
    };
    agents
        .iter()
        .filter(|a| a.role == AgentRole::Architect)
        .max_by(by_score)
        .or_else(|| agents.iter().filter(|a| a.role == AgentRole::Designer).max_by(by_score))
        .or_else(|| agents.iter().max_by(by_score))
        .map(|a| a.id)
        .expect("build checks agents is non-empty")
}

/// Level-1 lead roles, in priority order, mapped to their subtree label.
const LEAD_ROLE_TABLE: [(AgentRole, &str); 5] = [
    (AgentRole::Security, "security"),
    (AgentRole::PerformanceAnalyzer, "performance"),
    (AgentRole::Moderator, "coordination"),
    (AgentRole::Critic, "quality"),
    (AgentRole::Reviewer, "review"),
];

/// One lead per role in [`LEAD_ROLE_TABLE`] that is actually represented,
/// deduplicated by subtree label, excluding the root. Falls back to the
/// single top-scored remaining agent (as a placeholder lead) if none of the
/// five roles is present.
fn pick_leads(agents: &[AgentSummary], root: AgentId) -> Vec<AgentId> {
    let mut leads = Vec::new();
    let mut candidates: Vec<&AgentSummary> = agents.iter().filter(|a| a.id != root).collect();
    candidates.sort_by_key(|a| a.id.0);

    for &(role, _label) in &LEAD_ROLE_TABLE {
        if let Some(best) = candidates
            .iter()
            .filter(|a| a.role == role)
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        {
            leads.push(best.id);
        }
    }

    if leads.is_empty() {
        if let Some(best) = candidates
            .iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
        {
            leads.push(best.id);
        }
    }
    leads
}

/// Remaining agents attach to leads round-robin.
fn attach_followers(
    agents: &[AgentSummary],
    root: AgentId,
    leads: &[AgentId],
) -> HashMap<AgentId, AgentId> {
    let mut parent_of = HashMap::new();
    if leads.is_empty() {
        return parent_of;
    }
    let mut followers: Vec<&AgentSummary> = agents
        .iter()
        .filter(|a| a.id != root && !leads.contains(&a.id))
        .collect();
    followers.sort_by_key(|a| a.id.0);
    for (i, follower) in followers.into_iter().enumerate() {
        parent_of.insert(follower.id, leads[i % leads.len()]);
    }
    parent_of
}

fn build_channels(
    root: AgentId,
    leads: &[AgentId],
    parent_of: &HashMap<AgentId, AgentId>,
) -> Vec<CommunicationChannel> {
    let mut channels = Vec::new();
    for &lead in leads {
        channels.push(CommunicationChannel {
            from: root,
            to: lead,
            bidirectional: true,
            weight: 1.0,
        });
    }
    for (&child, &parent) in parent_of {
        channels.push(CommunicationChannel {
            from: parent,
            to: child,
            bidirectional: true,
            weight: 0.5,
        });
    }
    channels
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

    fn sample() -> Vec<AgentSummary> {
        vec![
            summary(AgentRole::Moderator, 9.0),
            summary(AgentRole::Proposer, 8.0),
            summary(AgentRole::Critic, 7.0),
            summary(AgentRole::Reviewer, 6.0),
            summary(AgentRole::Optimizer, 5.0),
        ]
    }

    #[test]
    fn root_has_no_parent() {
        let tree = TreeTopology::build(sample()).unwrap();
        assert!(!tree.parent_of.contains_key(&tree.root));
    }

    #[test]
    fn rebalance_on_lead_failure_reassigns_orphans() {
        let tree = TreeTopology::build(sample()).unwrap();
        let mut tree = tree;
        let failed_lead = tree.leads[0];
        let orphans: Vec<AgentId> = tree
            .parent_of
            .iter()
            .filter(|(_, parent)| **parent == failed_lead)
            .map(|(child, _)| *child)
            .collect();
        tree.rebalance(failed_lead).unwrap();
        assert!(!tree.leads.contains(&failed_lead));
        for orphan in orphans {
            if tree.leads.is_empty() {
                assert!(!tree.parent_of.contains_key(&orphan));
            } else {
                assert!(tree.parent_of.contains_key(&orphan) || orphan == failed_lead);
            }
        }
    }

    #[test]
    fn rebalance_unknown_agent_fails() {
        let mut tree = TreeTopology::build(sample()).unwrap();
        let unknown = AgentId(Uuid::new_v4());
        assert!(matches!(
            tree.rebalance(unknown),
            Err(TopologyError::AgentNotFound { .. })
        ));
    }
}
