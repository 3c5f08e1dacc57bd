//! Minimal end-to-end debate over a fixed four-agent roster, using the
//! fixture invoker so the example runs without any external provider.

use debate_engine::config::{GateConfig, OrchestratorConfig, PlannerConfig, TopologyConfig};
use debate_engine::invoker::FixtureInvoker;
use debate_engine::orchestrator::{DebateOrchestrator, DebateRequest};
use debate_engine::registry::AgentRegistry;
use debate_engine::types::{Agent, AgentRole};
use debate_engine::voting::HeuristicConsensusScorer;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let registry = AgentRegistry::new();
    let proposer = registry.register(Agent::new(AgentRole::Proposer, "openai", "gpt-4").with_score(8.0));
    let critic = registry.register(Agent::new(AgentRole::Critic, "anthropic", "claude-3").with_score(7.5));
    let reviewer = registry.register(Agent::new(AgentRole::Reviewer, "openai", "gpt-4").with_score(7.0));
    let optimizer = registry.register(Agent::new(AgentRole::Optimizer, "anthropic", "claude-3").with_score(7.5));

    let orchestrator = DebateOrchestrator::new(
        OrchestratorConfig::default(),
        registry,
        PlannerConfig::default(),
        GateConfig::default(),
        TopologyConfig::default(),
        Arc::new(
            FixtureInvoker::new()
                .with_response("Proposer", "Adopt a cache-aside pattern for the read path.")
                .with_response("Critic", "Cache invalidation on writes is unaddressed.")
                .with_response("Reviewer", "Proposal covers the stated requirements.")
                .with_response("Optimizer", "Batch invalidations to cut write amplification."),
        ),
        Arc::new(HeuristicConsensusScorer::new(5)),
    )?;

    let request = DebateRequest::new("How should we cache product catalog reads?", vec![
        proposer, critic, reviewer, optimizer,
    ]);
    let result = orchestrator.run_debate(request).await?;

    println!("success: {}", result.success);
    println!("final consensus: {:.2}", result.final_consensus);
    for phase in &result.phase_results {
        println!("- {:?} (round {}): consensus {:.2}", phase.phase, phase.round, phase.consensus_level);
    }

    Ok(())
}
