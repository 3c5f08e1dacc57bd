//! C10: Orchestrator — assembles every collaborator per debate request and
//! drives it end to end. The crate's `tracing` root span, mirroring the
//! teacher runtime's `AgentRuntime` assembly in its own `lib.rs`.

use crate::config::{GateConfig, OrchestratorConfig, PlannerConfig, TopologyConfig};
use crate::gate::ApprovalGate;
use crate::invoker::AgentInvoker;
use crate::phase::{PhaseMachine, RunParams, ValidationConfig};
use crate::planner::CognitivePlanner;
use crate::provenance::{EventType, NewEntry, ProvenanceTracker};
use crate::registry::AgentRegistry;
use crate::testing::SandboxRunner;
use crate::topology::Topology;
use crate::types::{
    Agent, AgentId, ConfigError, DebateContext, DebateId, DebateResult, EngineError, Phase, SessionId,
};
use crate::voting::ConsensusScorer;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info_span;
use tracing::Instrument;

/// Everything needed to start a debate. Defaults are applied by
/// [`DebateOrchestrator::run_debate`] for every field left unset.
#[derive(Debug, Clone)]
pub struct DebateRequest {
    pub debate_id: Option<DebateId>,
    pub topic: String,
    pub context: String,
    pub requirements: Vec<String>,
    pub agents: Vec<AgentId>,
    pub max_rounds: Option<u32>,
    pub timeout: Option<Duration>,
    pub topology: Option<crate::topology::TopologyKind>,
    pub min_consensus: Option<f64>,
}

impl DebateRequest {
    pub fn new(topic: impl Into<String>, agents: Vec<AgentId>) -> Self {
        Self {
            debate_id: None,
            topic: topic.into(),
            context: String::new(),
            requirements: Vec::new(),
            agents,
            max_rounds: None,
            timeout: None,
            topology: None,
            min_consensus: None,
        }
    }
}

struct ActiveDebate {
    cancel: CancellationToken,
}

/// Assembles C1-C9 and drives a debate through the phase machine. Cheap to
/// clone: every owned collaborator is `Arc`-wrapped.
#[derive(Clone)]
pub struct DebateOrchestrator {
    config: OrchestratorConfig,
    registry: AgentRegistry,
    planner: Arc<CognitivePlanner>,
    gate: Arc<ApprovalGate>,
    provenance: Arc<ProvenanceTracker>,
    invoker: Arc<dyn AgentInvoker>,
    voting: Arc<dyn ConsensusScorer>,
    topology_config: TopologyConfig,
    active_debates: Arc<Mutex<HashMap<DebateId, ActiveDebate>>>,
    validation: Option<ValidationConfig>,
}

impl DebateOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: AgentRegistry,
        planner_config: PlannerConfig,
        gate_config: GateConfig,
        topology_config: TopologyConfig,
        invoker: Arc<dyn AgentInvoker>,
        voting: Arc<dyn ConsensusScorer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        planner_config.validate()?;
        gate_config.validate()?;
        topology_config.validate()?;

        Ok(Self {
            config,
            registry,
            planner: Arc::new(CognitivePlanner::new(planner_config)),
            gate: Arc::new(ApprovalGate::new(gate_config)),
            provenance: Arc::new(ProvenanceTracker::new()),
            invoker,
            voting,
            topology_config,
            active_debates: Arc::new(Mutex::new(HashMap::new())),
            validation: None,
        })
    }

    /// Enables the C9 test-driven validation round for `phase`: each time
    /// that phase runs with at least two responses, candidate solutions are
    /// adversarially tested in `runner` before the planner sees the phase's
    /// key insights.
    pub fn with_validation(
        mut self,
        sandbox_config: crate::config::SandboxConfig,
        runner: Arc<dyn SandboxRunner>,
        language: impl Into<String>,
        phase: Phase,
    ) -> Self {
        self.validation = Some(ValidationConfig {
            sandbox_config,
            runner,
            language: language.into(),
            phase,
        });
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn provenance(&self) -> &ProvenanceTracker {
        &self.provenance
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// Runs one debate end to end: builds the team, instantiates the
    /// topology, drives the phase machine, and records the outcome.
    pub async fn run_debate(&self, request: DebateRequest) -> Result<DebateResult, EngineError> {
        let debate_id = request.debate_id.unwrap_or_default();
        let session_id = SessionId::new();

        let span = info_span!("debate", debate_id = %debate_id);
        async {
            let agent_count = request.agents.len();
            if agent_count < self.config.min_agents_per_debate {
                return Err(EngineError::Configuration(ConfigError::InsufficientAgents {
                    min: self.config.min_agents_per_debate,
                    actual: agent_count,
                }));
            }
            if agent_count > self.config.max_agents_per_debate {
                return Err(EngineError::Configuration(ConfigError::TooManyAgents {
                    max: self.config.max_agents_per_debate,
                    actual: agent_count,
                }));
            }

            let team: Vec<Agent> = self.registry.team(&request.agents)?;
            let kind = request.topology.unwrap_or(self.topology_config.kind);
            let mut topology = Topology::build(kind, &team)?;

            let cancel = CancellationToken::new();
            self.active_debates.lock().insert(
                debate_id,
                ActiveDebate {
                    cancel: cancel.clone(),
                },
            );

            self.provenance.record(
                session_id,
                NewEntry::new(EventType::DebateStarted).with_data("topic", request.topic.clone()),
            );

            let ctx = DebateContext::new(request.topic.clone())
                .with_context(request.context.clone())
                .with_requirements(request.requirements.clone());

            let machine = PhaseMachine::new(
                self.planner.clone(),
                self.gate.clone(),
                self.provenance.clone(),
                self.invoker.clone(),
                self.voting.clone(),
                self.validation.clone(),
            );

            let params = RunParams {
                debate_id,
                session_id,
                max_rounds: request.max_rounds.unwrap_or(self.config.default_max_rounds),
                min_consensus_score: request.min_consensus.unwrap_or(self.config.default_min_consensus),
                phase_timeout: self.topology_config.message_timeout,
                enabled_optional_phases: HashSet::new(),
            };

            let global_timeout = request.timeout.unwrap_or(self.config.default_timeout);
            let deadline = tokio::time::Instant::now() + global_timeout;

            let result = machine
                .run(&self.registry, &mut topology, &request.agents, ctx, &params, deadline, &cancel)
                .await;

            self.active_debates.lock().remove(&debate_id);
            self.provenance.record(
                session_id,
                NewEntry::new(EventType::DebateCompleted)
                    .with_data("success", result.success.to_string())
                    .with_data("final_consensus", result.final_consensus.to_string()),
            );

            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Flips a running debate's cancellation token. The phase machine
    /// observes this at the next phase boundary and returns a failed result.
    pub fn cancel_debate(&self, debate_id: DebateId) -> bool {
        match self.active_debates.lock().get(&debate_id) {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, debate_id: DebateId) -> bool {
        self.active_debates.lock().contains_key(&debate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::FixtureInvoker;
    use crate::types::AgentRole;
    use crate::voting::HeuristicConsensusScorer;

    fn orchestrator(registry: AgentRegistry) -> DebateOrchestrator {
        DebateOrchestrator::new(
            OrchestratorConfig {
                default_max_rounds: 1,
                min_agents_per_debate: 1,
                ..OrchestratorConfig::default()
            },
            registry,
            PlannerConfig::default(),
            GateConfig::default(),
            TopologyConfig::default(),
            Arc::new(FixtureInvoker::new()),
            Arc::new(HeuristicConsensusScorer::new(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn run_debate_below_minimum_agents_fails() {
        let registry = AgentRegistry::new();
        let orch = DebateOrchestrator::new(
            OrchestratorConfig {
                min_agents_per_debate: 2,
                ..OrchestratorConfig::default()
            },
            registry,
            PlannerConfig::default(),
            GateConfig::default(),
            TopologyConfig::default(),
            Arc::new(FixtureInvoker::new()),
            Arc::new(HeuristicConsensusScorer::new(5)),
        )
        .unwrap();

        let request = DebateRequest::new("topic", vec![AgentId::new()]);
        let err = orch.run_debate(request).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Configuration(ConfigError::InsufficientAgents { .. })
        ));
    }

    #[tokio::test]
    async fn run_debate_completes_and_unregisters_from_active_map() {
        let registry = AgentRegistry::new();
        let a = registry.register(Agent::new(AgentRole::Proposer, "p", "m").with_score(8.0));
        let b = registry.register(Agent::new(AgentRole::Critic, "p", "m").with_score(8.0));
        let orch = orchestrator(registry);

        let request = DebateRequest::new("topic", vec![a, b]);
        let result = orch.run_debate(request).await.unwrap();
        assert!(!result.phase_results.is_empty());
    }

    #[tokio::test]
    async fn cancel_unknown_debate_returns_false() {
        let registry = AgentRegistry::new();
        let orch = orchestrator(registry);
        assert!(!orch.cancel_debate(DebateId::new()));
    }

    #[tokio::test]
    async fn with_validation_records_tool_call_during_optimization() {
        use crate::testing::sandbox::FakeSandboxRunner;

        let registry = AgentRegistry::new();
        let a = registry.register(Agent::new(AgentRole::Proposer, "p", "m").with_score(8.0));
        let b = registry.register(Agent::new(AgentRole::Critic, "p", "m").with_score(8.0));
        let orch = orchestrator(registry).with_validation(
            crate::config::SandboxConfig::default(),
            Arc::new(FakeSandboxRunner::always_pass()),
            "python",
            crate::types::Phase::Optimization,
        );

        let request = DebateRequest::new("topic", vec![a, b]);
        orch.run_debate(request).await.unwrap();

        let session_ids = orch.provenance().session_ids();
        let entries = orch.provenance().entries(session_ids[0]);
        assert!(entries.iter().any(|e| matches!(
            e.event_type,
            crate::provenance::EventType::ToolCalled
        )));
    }
}
