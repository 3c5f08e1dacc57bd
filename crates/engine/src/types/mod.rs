//! Core identifiers and shared data structures for the debate engine.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub mod agent;
pub mod debate;
pub mod error;
pub mod message;

pub use agent::*;
pub use debate::*;
pub use error::*;
pub use message::*;

/// Unique identifier for agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DebateId(pub Uuid);

impl DebateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DebateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DebateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a provenance/audit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an approval gate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GateRequestId(pub Uuid);

impl GateRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GateRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GateRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Debate phases, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Dehallucination,
    SelfEvolvement,
    Proposal,
    Critique,
    Review,
    Optimization,
    Adversarial,
    Convergence,
}

impl Phase {
    /// The full ordered protocol sequence.
    pub const SEQUENCE: [Phase; 8] = [
        Phase::Dehallucination,
        Phase::SelfEvolvement,
        Phase::Proposal,
        Phase::Critique,
        Phase::Review,
        Phase::Optimization,
        Phase::Adversarial,
        Phase::Convergence,
    ];

    /// Phases that must be implemented and cannot pass through silently.
    pub const CORE: [Phase; 5] = [
        Phase::Proposal,
        Phase::Critique,
        Phase::Review,
        Phase::Optimization,
        Phase::Convergence,
    ];

    pub fn is_core(&self) -> bool {
        Self::CORE.contains(self)
    }

    /// The phase that follows this one in the sequence, `None` after convergence.
    pub fn next(&self) -> Option<Phase> {
        let idx = Self::SEQUENCE.iter().position(|p| p == self)?;
        Self::SEQUENCE.get(idx + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Dehallucination => "dehallucination",
            Phase::SelfEvolvement => "self_evolvement",
            Phase::Proposal => "proposal",
            Phase::Critique => "critique",
            Phase::Review => "review",
            Phase::Optimization => "optimization",
            Phase::Adversarial => "adversarial",
            Phase::Convergence => "convergence",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Clamp a floating point value into `[0, 1]`.
pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Wall-clock timestamp helper, kept as `SystemTime` so entries compare with
/// `Duration` arithmetic the way the audit trail's `duration` field expects.
pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Convenience conversion used across the crate when a `Duration` needs to be
/// expressed as milliseconds for delta scoring.
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
