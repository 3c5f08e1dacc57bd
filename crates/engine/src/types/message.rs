//! Inter-agent message envelope.

use super::{AgentId, MessageId, Phase};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// The semantic type of a message exchanged between agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Proposal,
    Critique,
    Review,
    Optimization,
    Convergence,
    Question,
    Answer,
    Acknowledge,
    Validation,
    Refinement,
}

/// An immutable message exchanged during a debate. Once constructed, a
/// message is never mutated; it lives for the duration of one debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: AgentId,
    /// Empty means broadcast to every reachable target.
    pub to: Vec<AgentId>,
    pub content: String,
    pub message_type: MessageType,
    pub phase: Phase,
    pub round: u32,
    pub timestamp: SystemTime,
    pub reply_to: Option<MessageId>,
    pub confidence: f64,
    pub metadata: HashMap<String, String>,
}

impl Message {
    pub fn new(
        from: AgentId,
        to: Vec<AgentId>,
        content: impl Into<String>,
        message_type: MessageType,
        phase: Phase,
        round: u32,
    ) -> Self {
        Self {
            id: MessageId::new(),
            from,
            to,
            content: content.into(),
            message_type,
            phase,
            round,
            timestamp: SystemTime::now(),
            reply_to: None,
            confidence: 0.5,
            metadata: HashMap::new(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.is_empty()
    }
}

/// A directed, weighted communication channel between two agents. Channels
/// are built once at topology initialization and rebuilt on rebalance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommunicationChannel {
    pub from: AgentId,
    pub to: AgentId,
    pub bidirectional: bool,
    pub weight: f64,
}
