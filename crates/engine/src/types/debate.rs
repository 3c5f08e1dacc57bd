//! Debate-scoped data carried through one run of the phase machine.

use super::{AgentId, AgentRole, Phase};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// The topic and constraints a debate is run against. Passed by value into
/// every agent invocation, augmented with the phase results accumulated so
/// far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateContext {
    pub topic: String,
    pub context: String,
    pub requirements: Vec<String>,
    pub current_phase: Phase,
    pub round: u32,
    pub phase_results: Vec<PhaseResult>,
}

impl DebateContext {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            context: String::new(),
            requirements: Vec::new(),
            current_phase: Phase::Dehallucination,
            round: 0,
            phase_results: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }
}

/// One agent's response within a single phase invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: AgentId,
    pub role: AgentRole,
    pub provider: String,
    pub model: String,
    pub content: String,
    pub confidence: f64,
    pub score: f64,
    pub latency: Duration,
    pub arguments: Vec<String>,
    pub criticisms: Vec<String>,
    pub suggestions: Vec<String>,
    pub timestamp: SystemTime,
}

/// The outcome of running one phase for one round. Phase results are
/// append-only per debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub round: u32,
    pub responses: Vec<AgentResponse>,
    pub consensus_level: f64,
    pub key_insights: Vec<String>,
    pub duration: Duration,
}

impl PhaseResult {
    /// Mean response confidence across all responses in this phase; `0.0`
    /// when there were none.
    pub fn mean_confidence(&self) -> f64 {
        if self.responses.is_empty() {
            return 0.0;
        }
        self.responses.iter().map(|r| r.confidence).sum::<f64>() / self.responses.len() as f64
    }
}

/// Final outcome returned by the orchestrator for one debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateResult {
    pub success: bool,
    pub final_phase: Phase,
    pub rounds_completed: u32,
    pub phase_results: Vec<PhaseResult>,
    pub final_consensus: f64,
    pub error: Option<String>,
}
