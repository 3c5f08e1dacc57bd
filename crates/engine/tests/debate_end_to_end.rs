use debate_engine::config::{GateConfig, OrchestratorConfig, PlannerConfig, TopologyConfig};
use debate_engine::invoker::FixtureInvoker;
use debate_engine::orchestrator::{DebateOrchestrator, DebateRequest};
use debate_engine::registry::AgentRegistry;
use debate_engine::topology::TopologyKind;
use debate_engine::types::{Agent, AgentRole, Phase};
use debate_engine::voting::HeuristicConsensusScorer;
use std::sync::Arc;

fn roster(registry: &AgentRegistry) -> Vec<debate_engine::types::AgentId> {
    vec![
        registry.register(Agent::new(AgentRole::Proposer, "openai", "gpt-4").with_score(8.0).with_confidence(0.8)),
        registry.register(Agent::new(AgentRole::Critic, "anthropic", "claude-3").with_score(7.5).with_confidence(0.8)),
        registry.register(Agent::new(AgentRole::Reviewer, "openai", "gpt-4").with_score(7.0).with_confidence(0.7)),
        registry.register(Agent::new(AgentRole::Optimizer, "anthropic", "claude-3").with_score(7.5).with_confidence(0.7)),
    ]
}

#[tokio::test]
async fn full_debate_over_mesh_topology_reaches_convergence() {
    let registry = AgentRegistry::new();
    let agents = roster(&registry);

    let orchestrator = DebateOrchestrator::new(
        OrchestratorConfig {
            default_max_rounds: 2,
            default_min_consensus: 0.0,
            min_agents_per_debate: 2,
            ..OrchestratorConfig::default()
        },
        registry,
        PlannerConfig::default(),
        GateConfig::default(),
        TopologyConfig {
            kind: TopologyKind::Mesh,
            ..TopologyConfig::default()
        },
        Arc::new(
            FixtureInvoker::new()
                .with_response("Proposer", "Ship the new indexing strategy.")
                .with_response("Critic", "Index rebuild cost is unaddressed.")
                .with_response("Reviewer", "Coverage looks complete.")
                .with_response("Optimizer", "Rebuild incrementally to cut cost."),
        ),
        Arc::new(HeuristicConsensusScorer::new(5)),
    )
    .unwrap();

    let request = DebateRequest::new("Should we change the product index strategy?", agents);
    let result = orchestrator.run_debate(request).await.unwrap();

    assert_eq!(result.final_phase, Phase::Convergence);
    assert!(result.phase_results.iter().any(|p| p.phase == Phase::Proposal && !p.responses.is_empty()));
    assert!(result.phase_results.iter().any(|p| p.phase == Phase::Critique && !p.responses.is_empty()));
}

#[tokio::test]
async fn provenance_records_debate_lifecycle_events() {
    let registry = AgentRegistry::new();
    let agents = roster(&registry);

    let orchestrator = DebateOrchestrator::new(
        OrchestratorConfig {
            default_max_rounds: 1,
            default_min_consensus: 0.0,
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

    let request = DebateRequest::new("topic", agents);
    orchestrator.run_debate(request).await.unwrap();

    let session_ids = orchestrator.provenance().session_ids();
    assert_eq!(session_ids.len(), 1);
    let entries = orchestrator.provenance().entries(session_ids[0]);
    assert!(entries.iter().any(|e| matches!(e.event_type, debate_engine::provenance::EventType::DebateStarted)));
    assert!(entries.iter().any(|e| matches!(e.event_type, debate_engine::provenance::EventType::DebateCompleted)));
}

/// Invoker that sleeps before responding, so a test can reliably cancel a
/// debate mid-flight instead of racing the (otherwise near-instant) fixture.
struct SlowInvoker {
    delay: std::time::Duration,
}

#[async_trait::async_trait]
impl debate_engine::invoker::AgentInvoker for SlowInvoker {
    async fn invoke(
        &self,
        agent: &debate_engine::types::Agent,
        prompt: &str,
        ctx: &debate_engine::types::DebateContext,
        deadline: std::time::Duration,
    ) -> Result<debate_engine::invoker::InvocationResponse, debate_engine::types::InvokerError> {
        tokio::time::sleep(self.delay).await;
        FixtureInvoker::new().invoke(agent, prompt, ctx, deadline).await
    }
}

#[tokio::test]
async fn cancel_debate_mid_flight_marks_it_failed() {
    let registry = AgentRegistry::new();
    let agents = roster(&registry);

    let orchestrator = DebateOrchestrator::new(
        OrchestratorConfig {
            default_max_rounds: 5,
            default_min_consensus: 2.0,
            min_agents_per_debate: 2,
            ..OrchestratorConfig::default()
        },
        registry,
        PlannerConfig::default(),
        GateConfig::default(),
        TopologyConfig::default(),
        Arc::new(SlowInvoker { delay: std::time::Duration::from_millis(200) }),
        Arc::new(HeuristicConsensusScorer::new(5)),
    )
    .unwrap();

    let debate_id = debate_engine::types::DebateId::new();
    let mut request = DebateRequest::new("topic", agents);
    request.debate_id = Some(debate_id);

    let orchestrator_clone = orchestrator.clone();
    let handle = tokio::spawn(async move { orchestrator_clone.run_debate(request).await });

    // Give the debate a moment to register itself as active, then cancel it.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(orchestrator.is_active(debate_id));
    assert!(orchestrator.cancel_debate(debate_id));

    let result = handle.await.unwrap().unwrap();
    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(!orchestrator.is_active(debate_id));
}
