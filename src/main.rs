//! CLI front-end for the debate coordination engine.

use clap::{Parser, Subcommand};
use debate_engine::config::{GateConfig, OrchestratorConfig, PlannerConfig, TopologyConfig};
use debate_engine::invoker::FixtureInvoker;
use debate_engine::orchestrator::{DebateOrchestrator, DebateRequest};
use debate_engine::registry::AgentRegistry;
use debate_engine::topology::TopologyKind;
use debate_engine::types::{Agent, AgentRole};
use debate_engine::voting::HeuristicConsensusScorer;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "arena", version = VERSION, about = "Multi-agent debate coordination engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a debate over a topic with a fixed roster of fixture agents.
    Debate {
        /// The topic to debate.
        topic: String,
        /// Maximum number of rounds before the debate is forced to conclude.
        #[arg(long, default_value_t = 3)]
        rounds: u32,
        /// Minimum consensus level required for early convergence.
        #[arg(long, default_value_t = 0.8)]
        consensus: f64,
        /// Topology to route agent communication through.
        #[arg(long, value_enum, default_value = "mesh")]
        topology: TopologyArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TopologyArg {
    Mesh,
    Star,
    Chain,
    Tree,
}

impl From<TopologyArg> for TopologyKind {
    fn from(t: TopologyArg) -> Self {
        match t {
            TopologyArg::Mesh => TopologyKind::Mesh,
            TopologyArg::Star => TopologyKind::Star,
            TopologyArg::Chain => TopologyKind::Chain,
            TopologyArg::Tree => TopologyKind::Tree,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Debate { topic, rounds, consensus, topology }) => {
            run_debate(topic, rounds, consensus, topology.into()).await?;
        }
        None => {
            println!("arena v{VERSION}");
            println!("Use --help for available commands");
        }
    }
    Ok(())
}

async fn run_debate(topic: String, rounds: u32, consensus: f64, topology: TopologyKind) -> anyhow::Result<()> {
    let registry = AgentRegistry::new();
    let roster = [
        (AgentRole::Proposer, "openai", "gpt-4"),
        (AgentRole::Critic, "anthropic", "claude-3"),
        (AgentRole::Reviewer, "openai", "gpt-4"),
        (AgentRole::Optimizer, "anthropic", "claude-3"),
    ];
    let agent_ids: Vec<_> = roster
        .into_iter()
        .map(|(role, provider, model)| registry.register(Agent::new(role, provider, model)))
        .collect();

    let orchestrator = DebateOrchestrator::new(
        OrchestratorConfig::default(),
        registry,
        PlannerConfig::default(),
        GateConfig::default(),
        TopologyConfig {
            kind: topology,
            ..TopologyConfig::default()
        },
        Arc::new(FixtureInvoker::new()),
        Arc::new(HeuristicConsensusScorer::new(5)),
    )?;

    let mut request = DebateRequest::new(topic, agent_ids);
    request.max_rounds = Some(rounds);
    request.min_consensus = Some(consensus);

    let result = orchestrator.run_debate(request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
