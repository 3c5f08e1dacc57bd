//! C5: Phase state machine — drives the eight-phase protocol one round at a
//! time: expectation, leader/group selection, concurrent invocation, voting,
//! gate consultation, planner comparison/refinement, provenance logging.

use crate::gate::ApprovalGate;
use crate::invoker::AgentInvoker;
use crate::planner::{ActualMetrics, CognitivePlanner};
use crate::provenance::{EventType, NewEntry, ProvenanceTracker};
use crate::registry::AgentRegistry;
use crate::testing::SandboxRunner;
use crate::topology::Topology;
use crate::types::{
    AgentId, AgentResponse, DebateContext, DebateId, DebateResult, Phase, PhaseError, PhaseResult,
    SessionId,
};
use crate::voting::ConsensusScorer;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Optional C9 wiring: when present and `phase` matches the phase currently
/// running, `run_phase` runs an adversarial validation round over that
/// phase's responses and folds its recommendations into the key insights.
#[derive(Clone)]
pub struct ValidationConfig {
    pub sandbox_config: crate::config::SandboxConfig,
    pub runner: Arc<dyn SandboxRunner>,
    pub language: String,
    pub phase: Phase,
}

/// Bundles the per-debate collaborators the phase machine drives. Cheap to
/// clone: every field is already `Arc`-backed or `Clone`.
#[derive(Clone)]
pub struct PhaseMachine {
    planner: Arc<CognitivePlanner>,
    gate: Arc<ApprovalGate>,
    provenance: Arc<ProvenanceTracker>,
    invoker: Arc<dyn AgentInvoker>,
    voting: Arc<dyn ConsensusScorer>,
    validation: Option<ValidationConfig>,
}

/// Per-run tunables that don't belong to any one collaborator's config.
pub struct RunParams {
    pub debate_id: DebateId,
    pub session_id: SessionId,
    pub max_rounds: u32,
    pub min_consensus_score: f64,
    pub phase_timeout: Duration,
    /// Optional phases (dehallucination, self-evolvement, adversarial) that
    /// run for real rather than passing through untouched.
    pub enabled_optional_phases: HashSet<Phase>,
}

impl PhaseMachine {
    pub fn new(
        planner: Arc<CognitivePlanner>,
        gate: Arc<ApprovalGate>,
        provenance: Arc<ProvenanceTracker>,
        invoker: Arc<dyn AgentInvoker>,
        voting: Arc<dyn ConsensusScorer>,
        validation: Option<ValidationConfig>,
    ) -> Self {
        Self {
            planner,
            gate,
            provenance,
            invoker,
            voting,
            validation,
        }
    }

    /// Runs the full protocol until convergence, timeout, cancellation, or
    /// `max_rounds` is exhausted.
    pub async fn run(
        &self,
        registry: &AgentRegistry,
        topology: &mut Topology,
        team: &[AgentId],
        mut ctx: DebateContext,
        params: &RunParams,
        global_deadline: Instant,
        cancel: &CancellationToken,
    ) -> DebateResult {
        let mut rounds_completed = 0u32;
        let mut final_phase = Phase::Dehallucination;
        let mut final_consensus = 0.0;
        let mut cycle_completed = false;

        for round in 0..params.max_rounds.max(1) {
            ctx.round = round;
            rounds_completed = round + 1;

            for phase in Phase::SEQUENCE {
                ctx.current_phase = phase;
                final_phase = phase;

                if cancel.is_cancelled() {
                    return Self::failure(ctx, rounds_completed, final_phase, final_consensus, PhaseError::Cancelled);
                }
                let remaining = global_deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Self::failure(ctx, rounds_completed, final_phase, final_consensus, PhaseError::GlobalTimeout);
                }

                let runs_for_real = phase.is_core() || params.enabled_optional_phases.contains(&phase);
                let call_deadline = remaining.min(params.phase_timeout);

                let result = if runs_for_real {
                    match self
                        .run_phase(registry, topology, team, &ctx, params, call_deadline, cancel)
                        .await
                    {
                        Ok(r) => r,
                        Err(e) => return Self::failure(ctx, rounds_completed, final_phase, final_consensus, e),
                    }
                } else {
                    self.pass_through(phase, round)
                };

                final_consensus = result.consensus_level;
                info!(?phase, round, consensus = final_consensus, "phase complete");
                ctx.phase_results.push(result);

                if phase == Phase::Convergence {
                    cycle_completed = true;
                }

                if cycle_completed && final_consensus >= params.min_consensus_score {
                    return DebateResult {
                        success: true,
                        final_phase,
                        rounds_completed,
                        phase_results: ctx.phase_results,
                        final_consensus,
                        error: None,
                    };
                }
            }
        }

        DebateResult {
            success: final_consensus >= params.min_consensus_score,
            final_phase,
            rounds_completed,
            phase_results: ctx.phase_results,
            final_consensus,
            error: None,
        }
    }

    fn failure(
        ctx: DebateContext,
        rounds_completed: u32,
        final_phase: Phase,
        final_consensus: f64,
        err: PhaseError,
    ) -> DebateResult {
        warn!(error = %err, "debate failed");
        DebateResult {
            success: false,
            final_phase,
            rounds_completed,
            phase_results: ctx.phase_results,
            final_consensus,
            error: Some(err.to_string()),
        }
    }

    fn pass_through(&self, phase: Phase, round: u32) -> PhaseResult {
        PhaseResult {
            phase,
            round,
            responses: Vec::new(),
            consensus_level: self.planner.baseline(phase).avg_consensus,
            key_insights: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Runs one phase for real: expectation, invocation, voting, gate,
    /// comparison/refinement, provenance.
    async fn run_phase(
        &self,
        registry: &AgentRegistry,
        topology: &mut Topology,
        team: &[AgentId],
        ctx: &DebateContext,
        params: &RunParams,
        call_deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<PhaseResult, PhaseError> {
        let started = Instant::now();
        let phase = ctx.current_phase;
        let round = ctx.round;

        let agents = registry
            .team(team)
            .map_err(|_| PhaseError::AllAgentsFailed { phase: phase.to_string() })?;

        self.provenance.record(
            params.session_id,
            NewEntry::new(EventType::PhaseStarted).with_phase(phase),
        );

        let expectation = self.planner.set_expectation(phase, round, &agents);

        let leader = topology.leader(phase).ok();
        let groups = topology.parallel_groups(phase);

        let mut responses = Vec::new();
        let mut failures = 0usize;
        let mut attempted = 0usize;

        for group in groups {
            if cancel.is_cancelled() {
                return Err(PhaseError::Cancelled);
            }
            let invocations = group.into_iter().filter_map(|agent_id| {
                registry.get(agent_id).ok().map(|agent| {
                    let prompt = build_prompt(&agent, ctx, leader);
                    let invoker = self.invoker.clone();
                    let ctx_clone = ctx.clone();
                    async move {
                        let outcome = invoker.invoke(&agent, &prompt, &ctx_clone, call_deadline).await;
                        (agent, outcome)
                    }
                })
            });

            let results = futures::future::join_all(invocations).await;
            for (agent, outcome) in results {
                attempted += 1;
                match outcome {
                    Ok(resp) => {
                        let _ = registry.record_metrics(agent.id, resp.latency);
                        self.provenance.record(
                            params.session_id,
                            NewEntry::new(EventType::ResponseReceived)
                                .with_agent(agent.id)
                                .with_phase(phase)
                                .with_data("model", agent.model.clone())
                                .with_data("provider", agent.provider.clone()),
                        );
                        responses.push(to_agent_response(&agent, phase, resp));
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(agent_id = %agent.id, error = %e, "agent invocation failed");
                        self.provenance.record(
                            params.session_id,
                            NewEntry::new(EventType::ErrorOccurred)
                                .with_agent(agent.id)
                                .with_phase(phase)
                                .with_data("error", e.to_string()),
                        );
                    }
                }
            }
        }

        if attempted > 0 && failures == attempted {
            return Err(PhaseError::AllAgentsFailed { phase: phase.to_string() });
        }

        let (consensus_level, mut key_insights) = self.voting.score(&responses);

        if let Some(validation) = self.validation.as_ref() {
            if validation.phase == phase && responses.len() >= 2 {
                let solutions: Vec<crate::testing::Solution> = responses
                    .iter()
                    .map(|r| crate::testing::Solution {
                        id: format!("{}-r{}", r.agent_id, round),
                        agent_id: r.agent_id,
                        language: validation.language.clone(),
                        code: r.content.clone(),
                    })
                    .collect();

                match crate::testing::run_validation_round(
                    &solutions,
                    &ctx.topic,
                    "medium",
                    &validation.sandbox_config,
                    validation.runner.as_ref(),
                    registry,
                    self.invoker.as_ref(),
                    ctx,
                    call_deadline,
                )
                .await
                {
                    Ok(round) => {
                        self.provenance.record(
                            params.session_id,
                            NewEntry::new(EventType::ToolCalled)
                                .with_phase(phase)
                                .with_data("validation_tests", round.tests.len().to_string())
                                .with_data("validation_winner", round.winner.clone().unwrap_or_default()),
                        );
                        key_insights.extend(round.recommendations);
                    }
                    Err(e) => {
                        warn!(error = %e, "validation round skipped");
                    }
                }
            }
        }

        let duration = started.elapsed();

        let result = PhaseResult {
            phase,
            round,
            responses,
            consensus_level,
            key_insights: key_insights.clone(),
            duration,
        };

        let mut artifacts = std::collections::HashMap::new();
        artifacts.insert("consensus".to_string(), consensus_level.to_string());
        let _ = self
            .gate
            .check_gate(
                params.debate_id,
                params.session_id,
                phase,
                format!("phase {phase} completed with consensus {consensus_level:.2}"),
                artifacts,
                cancel,
            )
            .await;

        let goals_achieved = infer_goals_achieved(phase, &result);
        let actual = ActualMetrics {
            confidence: result.mean_confidence(),
            consensus: consensus_level,
            insights: key_insights.len() as u32,
            latency: duration,
        };
        let comparison = self.planner.compare(&expectation, &actual, &goals_achieved, &key_insights);
        let _refinement = self.planner.refine(&comparison, &agents);

        self.provenance.record(
            params.session_id,
            NewEntry::new(EventType::PhaseCompleted)
                .with_phase(phase)
                .with_data("consensus", consensus_level.to_string())
                .with_data("overall_score", comparison.overall_score.to_string()),
        );

        Ok(result)
    }
}

fn build_prompt(agent: &crate::types::Agent, ctx: &DebateContext, leader: Option<AgentId>) -> String {
    let role_note = if leader == Some(agent.id) { " (leader)" } else { "" };
    format!(
        "[{phase}{role_note}] topic: {topic}\ncontext: {context}\nround: {round}",
        phase = ctx.current_phase,
        topic = ctx.topic,
        context = ctx.context,
        round = ctx.round,
    )
}

fn to_agent_response(
    agent: &crate::types::Agent,
    phase: Phase,
    resp: crate::invoker::InvocationResponse,
) -> AgentResponse {
    let mut arguments = Vec::new();
    let mut criticisms = Vec::new();
    let mut suggestions = Vec::new();
    match phase {
        Phase::Critique | Phase::Adversarial => criticisms.push(resp.content.clone()),
        Phase::Optimization => suggestions.push(resp.content.clone()),
        _ => arguments.push(resp.content.clone()),
    }

    AgentResponse {
        agent_id: agent.id,
        role: agent.role,
        provider: agent.provider.clone(),
        model: agent.model.clone(),
        content: resp.content,
        confidence: resp.confidence,
        score: agent.score,
        latency: resp.latency,
        arguments,
        criticisms,
        suggestions,
        timestamp: crate::types::now(),
    }
}

fn infer_goals_achieved(phase: Phase, result: &PhaseResult) -> Vec<String> {
    let mut achieved = Vec::new();
    if result.responses.is_empty() {
        return achieved;
    }
    match phase {
        Phase::Proposal => {
            achieved.push("Generate a concrete proposal".to_string());
            if result.responses.iter().any(|r| !r.arguments.is_empty()) {
                achieved.push("Cover stated requirements".to_string());
            }
        }
        Phase::Critique => {
            if !result.responses.iter().all(|r| r.criticisms.is_empty()) {
                achieved.push("Identify weaknesses".to_string());
            }
        }
        Phase::Review => {
            achieved.push("Assess correctness".to_string());
            achieved.push("Assess completeness".to_string());
        }
        Phase::Optimization => {
            achieved.push("Improve efficiency".to_string());
            achieved.push("Preserve correctness".to_string());
        }
        Phase::Convergence => {
            if result.consensus_level >= 0.5 {
                achieved.push("Reach consensus".to_string());
            }
        }
        _ => {}
    }
    achieved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GateConfig, PlannerConfig};
    use crate::invoker::FixtureInvoker;
    use crate::topology::TopologyKind;
    use crate::types::{Agent, AgentRole};
    use crate::voting::HeuristicConsensusScorer;
    use std::time::Duration as StdDuration;

    fn machine() -> PhaseMachine {
        PhaseMachine::new(
            Arc::new(CognitivePlanner::new(PlannerConfig::default())),
            Arc::new(ApprovalGate::new(GateConfig::default())),
            Arc::new(ProvenanceTracker::new()),
            Arc::new(FixtureInvoker::new()),
            Arc::new(HeuristicConsensusScorer::new(5)),
            None,
        )
    }

    #[tokio::test]
    async fn runs_core_phases_and_reaches_convergence() {
        let registry = AgentRegistry::new();
        let agents = vec![
            registry.register(Agent::new(AgentRole::Proposer, "p", "m").with_score(8.0).with_confidence(0.9)),
            registry.register(Agent::new(AgentRole::Critic, "p", "m").with_score(8.0).with_confidence(0.9)),
        ];
        let full_agents = registry.team(&agents).unwrap();
        let mut topology = Topology::build(TopologyKind::Mesh, &full_agents).unwrap();

        let params = RunParams {
            debate_id: DebateId::new(),
            session_id: SessionId::new(),
            max_rounds: 1,
            min_consensus_score: 0.0,
            phase_timeout: StdDuration::from_secs(5),
            enabled_optional_phases: HashSet::new(),
        };

        let machine = machine();
        let ctx = DebateContext::new("topic");
        let deadline = Instant::now() + StdDuration::from_secs(10);
        let cancel = CancellationToken::new();
        let result = machine.run(&registry, &mut topology, &agents, ctx, &params, deadline, &cancel).await;

        assert_eq!(result.final_phase, Phase::Convergence);
        assert!(result.rounds_completed >= 1);
        assert!(result.phase_results.iter().any(|r| r.phase == Phase::Proposal));
    }

    #[tokio::test]
    async fn optional_phases_pass_through_when_not_enabled() {
        let registry = AgentRegistry::new();
        let agents = vec![registry.register(Agent::new(AgentRole::Proposer, "p", "m"))];
        let full_agents = registry.team(&agents).unwrap();
        let mut topology = Topology::build(TopologyKind::Mesh, &full_agents).unwrap();

        let params = RunParams {
            debate_id: DebateId::new(),
            session_id: SessionId::new(),
            max_rounds: 1,
            min_consensus_score: 2.0,
            phase_timeout: StdDuration::from_secs(5),
            enabled_optional_phases: HashSet::new(),
        };

        let machine = machine();
        let ctx = DebateContext::new("topic");
        let deadline = Instant::now() + StdDuration::from_secs(10);
        let cancel = CancellationToken::new();
        let result = machine.run(&registry, &mut topology, &agents, ctx, &params, deadline, &cancel).await;

        let dehallucination = result
            .phase_results
            .iter()
            .find(|r| r.phase == Phase::Dehallucination)
            .unwrap();
        assert!(dehallucination.responses.is_empty());
    }

    #[tokio::test]
    async fn validation_round_runs_when_phase_matches_and_adds_insights() {
        use crate::testing::sandbox::FakeSandboxRunner;

        let registry = AgentRegistry::new();
        let agents = vec![
            registry.register(Agent::new(AgentRole::Proposer, "p", "m").with_score(8.0).with_confidence(0.9)),
            registry.register(Agent::new(AgentRole::Critic, "p", "m").with_score(8.0).with_confidence(0.9)),
        ];
        let full_agents = registry.team(&agents).unwrap();
        let mut topology = Topology::build(TopologyKind::Mesh, &full_agents).unwrap();

        let provenance = Arc::new(ProvenanceTracker::new());
        let invoker = Arc::new(
            FixtureInvoker::new()
                .with_response("Proposer", "def add(a, b):\n    return a + b\n")
                .with_response("Critic", "def add(a, b):\n    return a + b\n"),
        );
        let machine = PhaseMachine::new(
            Arc::new(CognitivePlanner::new(PlannerConfig::default())),
            Arc::new(ApprovalGate::new(GateConfig::default())),
            provenance.clone(),
            invoker,
            Arc::new(HeuristicConsensusScorer::new(5)),
            Some(ValidationConfig {
                sandbox_config: crate::config::SandboxConfig::default(),
                runner: Arc::new(FakeSandboxRunner::always_pass()),
                language: "python".to_string(),
                phase: Phase::Optimization,
            }),
        );

        let params = RunParams {
            debate_id: DebateId::new(),
            session_id: SessionId::new(),
            max_rounds: 1,
            min_consensus_score: 0.0,
            phase_timeout: StdDuration::from_secs(5),
            enabled_optional_phases: HashSet::new(),
        };

        let ctx = DebateContext::new("topic");
        let deadline = Instant::now() + StdDuration::from_secs(10);
        let cancel = CancellationToken::new();
        let result = machine.run(&registry, &mut topology, &agents, ctx, &params, deadline, &cancel).await;

        let optimization = result
            .phase_results
            .iter()
            .find(|r| r.phase == Phase::Optimization)
            .unwrap();
        assert_eq!(optimization.responses.len(), 2);

        let entries = provenance.entries(params.session_id);
        assert!(entries
            .iter()
            .any(|e| matches!(e.event_type, EventType::ToolCalled) && e.phase == Some(Phase::Optimization)));
    }

    #[tokio::test]
    async fn cancellation_before_start_fails_debate() {
        let registry = AgentRegistry::new();
        let agents = vec![registry.register(Agent::new(AgentRole::Proposer, "p", "m"))];
        let full_agents = registry.team(&agents).unwrap();
        let mut topology = Topology::build(TopologyKind::Mesh, &full_agents).unwrap();

        let params = RunParams {
            debate_id: DebateId::new(),
            session_id: SessionId::new(),
            max_rounds: 1,
            min_consensus_score: 0.5,
            phase_timeout: StdDuration::from_secs(5),
            enabled_optional_phases: HashSet::new(),
        };

        let machine = machine();
        let ctx = DebateContext::new("topic");
        let deadline = Instant::now() + StdDuration::from_secs(10);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = machine.run(&registry, &mut topology, &agents, ctx, &params, deadline, &cancel).await;

        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
