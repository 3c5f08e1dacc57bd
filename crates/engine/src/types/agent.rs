//! Agent identity, role, and live metrics.

use super::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// The role an agent plays within a debate. Reassignable by the topology
/// (e.g. dynamic role promotion, tree rebalance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Proposer,
    Critic,
    Reviewer,
    Optimizer,
    Moderator,
    Architect,
    Validator,
    RedTeam,
    BlueTeam,
    Security,
    TestAgent,
    Teacher,
    Generator,
    Refactorer,
    PerformanceAnalyzer,
    Compiler,
    Executor,
    Judge,
    Implementer,
    Designer,
}

impl AgentRole {
    /// Roles that are continuously active across every phase (adversarial
    /// agents get added to every mesh parallel group regardless of the
    /// phase's preferred roles).
    pub fn is_continuously_active(&self) -> bool {
        matches!(self, AgentRole::RedTeam | AgentRole::BlueTeam | AgentRole::Security)
    }
}

/// Live, mutable metrics tracked per agent across its process lifetime.
#[derive(Debug, Clone)]
pub struct AgentMetrics {
    pub message_count: u64,
    /// Rolling mean response time across all invocations.
    pub rolling_mean_response: Duration,
    pub last_active: Option<Instant>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            message_count: 0,
            rolling_mean_response: Duration::ZERO,
            last_active: None,
        }
    }
}

impl AgentMetrics {
    /// Fold in a new observed latency using a simple incremental mean.
    pub fn record(&mut self, latency: Duration) {
        let n = self.message_count as f64;
        let prev = self.rolling_mean_response.as_secs_f64();
        let new_mean = (prev * n + latency.as_secs_f64()) / (n + 1.0);
        self.rolling_mean_response = Duration::from_secs_f64(new_mean.max(0.0));
        self.message_count += 1;
        self.last_active = Some(Instant::now());
    }
}

/// A stateful wrapper around one (provider, model) pair with a role and
/// scores. Agents are process-wide and shared by reference across debates;
/// the identifier and static provenance (provider/model) never change, while
/// role, confidence, and metrics are mutated in place by the topology and
/// planner.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub role: AgentRole,
    pub provider: String,
    pub model: String,
    /// Verifier score, typically in `[0, 10]`.
    pub score: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub specialization: Option<String>,
    pub capabilities: HashSet<String>,
    pub metrics: AgentMetrics,
}

impl Agent {
    pub fn new(role: AgentRole, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            role,
            provider: provider.into(),
            model: model.into(),
            score: 5.0,
            confidence: 0.5,
            specialization: None,
            capabilities: HashSet::new(),
            metrics: AgentMetrics::default(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }

    /// Seconds of rolling mean response latency, used by the topology's
    /// dynamic role reassignment scoring.
    pub fn latency_seconds(&self) -> f64 {
        self.metrics.rolling_mean_response.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_rolling_mean() {
        let mut m = AgentMetrics::default();
        m.record(Duration::from_millis(100));
        m.record(Duration::from_millis(300));
        assert!((m.rolling_mean_response.as_secs_f64() - 0.2).abs() < 1e-9);
        assert_eq!(m.message_count, 2);
    }

    #[test]
    fn continuously_active_roles() {
        assert!(AgentRole::RedTeam.is_continuously_active());
        assert!(!AgentRole::Proposer.is_continuously_active());
    }
}
