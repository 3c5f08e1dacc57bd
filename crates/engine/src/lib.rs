//! Multi-agent debate coordination engine.
//!
//! Composes an [`AgentRegistry`](registry::AgentRegistry), a [`Topology`],
//! a [`MessageBus`](communication::MessageBus), an [`AgentInvoker`], a
//! [`CognitivePlanner`](planner::CognitivePlanner), an
//! [`ApprovalGate`](gate::ApprovalGate), a
//! [`ProvenanceTracker`](provenance::ProvenanceTracker), and the
//! [`PhaseMachine`](phase::PhaseMachine) into one [`DebateOrchestrator`].

pub mod communication;
pub mod config;
pub mod gate;
pub mod invoker;
pub mod orchestrator;
pub mod phase;
pub mod planner;
pub mod provenance;
pub mod registry;
pub mod testing;
pub mod topology;
pub mod types;
pub mod voting;

pub use orchestrator::{DebateOrchestrator, DebateRequest};
pub use types::{AgentId, DebateId, DebateResult, EngineError, SessionId};
