//! C4: Agent invoker — the abstract "ask an agent for a response" call.
//! No state is kept beyond a single call; concrete implementations are
//! injected at construction, mirroring the provider abstraction the
//! reasoning layer uses for its inference backends.

use crate::types::{Agent, DebateContext, InvokerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Token accounting returned alongside a response, when the provider reports it.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One agent's answer to a single invocation.
#[derive(Debug, Clone)]
pub struct InvocationResponse {
    pub content: String,
    pub confidence: f64,
    pub latency: Duration,
    pub tokens: TokenUsage,
    pub finish_reason: String,
}

/// Estimates a confidence score for raw model output when the provider
/// doesn't report one directly. Pluggable so a structured "Confidence: X%"
/// parser can replace the length/finish-reason heuristic without touching
/// any other contract.
pub trait ConfidenceEstimator: Send + Sync {
    fn estimate(&self, content: &str, finish_reason: &str) -> f64;
}

/// Default heuristic: longer, cleanly-finished responses score higher.
/// Preserved as a coarse but literal implementation of the length and
/// finish-reason based extraction named in the component contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicConfidenceEstimator;

impl ConfidenceEstimator for HeuristicConfidenceEstimator {
    fn estimate(&self, content: &str, finish_reason: &str) -> f64 {
        let length_component = (content.len() as f64 / 500.0).min(1.0) * 0.5;
        let finish_component = match finish_reason {
            "stop" | "complete" => 0.5,
            "length" => 0.3,
            _ => 0.2,
        };
        crate::types::clamp01(length_component + finish_component)
    }
}

/// Abstract "ask an agent for a response" capability. Implementations own
/// the connection to whatever actually produces the content (an LLM API, a
/// fixture for tests); the engine never assumes a transport.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        agent: &Agent,
        prompt: &str,
        ctx: &DebateContext,
        deadline: Duration,
    ) -> Result<InvocationResponse, InvokerError>;
}

/// A deterministic invoker used by tests and examples: looks up canned
/// responses by agent role, or echoes the prompt back with a fixed
/// confidence if none is registered.
#[derive(Debug, Clone, Default)]
pub struct FixtureInvoker {
    responses: HashMap<String, String>,
}

impl FixtureInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, role_key: impl Into<String>, content: impl Into<String>) -> Self {
        self.responses.insert(role_key.into(), content.into());
        self
    }
}

#[async_trait]
impl AgentInvoker for FixtureInvoker {
    async fn invoke(
        &self,
        agent: &Agent,
        prompt: &str,
        _ctx: &DebateContext,
        _deadline: Duration,
    ) -> Result<InvocationResponse, InvokerError> {
        let key = format!("{:?}", agent.role);
        let content = self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| format!("[{}] acknowledged: {}", key, prompt));
        let estimator = HeuristicConfidenceEstimator;
        let confidence = estimator.estimate(&content, "stop");
        Ok(InvocationResponse {
            content,
            confidence,
            latency: Duration::from_millis(5),
            tokens: TokenUsage::default(),
            finish_reason: "stop".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentRole, DebateContext};

    #[tokio::test]
    async fn fixture_invoker_returns_registered_response() {
        let invoker = FixtureInvoker::new().with_response("Proposer", "my proposal");
        let agent = Agent::new(AgentRole::Proposer, "p", "m");
        let ctx = DebateContext::new("topic");
        let resp = invoker
            .invoke(&agent, "go", &ctx, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.content, "my proposal");
    }

    #[test]
    fn heuristic_confidence_is_bounded() {
        let estimator = HeuristicConfidenceEstimator;
        assert!(estimator.estimate("", "other") >= 0.0);
        assert!(estimator.estimate(&"x".repeat(5000), "stop") <= 1.0);
    }
}
