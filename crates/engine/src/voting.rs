//! Voting/consensus collaborator: turns one phase's responses into a
//! consensus scalar and key insights. Concrete scoring is pluggable, mirroring
//! the invoker's confidence-estimator split — a default heuristic ships so
//! the engine is runnable without an external scorer.

use crate::types::{clamp01, AgentResponse};

/// Given a set of phase responses, returns a consensus scalar in [0, 1] and a
/// list of key insights. Implementations may call out to an external scoring
/// service; the engine never inspects response content itself beyond what a
/// `ConsensusScorer` extracts.
pub trait ConsensusScorer: Send + Sync {
    fn score(&self, responses: &[AgentResponse]) -> (f64, Vec<String>);
}

/// Consensus = mean confidence weighted by agreement: agreement is 1 minus
/// the normalized spread (max − min) of confidences, so a phase where every
/// agent is equally (un)confident scores higher than one with a wide split.
/// Key insights are drawn from the highest-confidence response's arguments
/// and suggestions, capped to avoid unbounded growth.
#[derive(Debug, Clone, Default)]
pub struct HeuristicConsensusScorer {
    pub max_insights: usize,
}

impl HeuristicConsensusScorer {
    pub fn new(max_insights: usize) -> Self {
        Self { max_insights }
    }
}

impl ConsensusScorer for HeuristicConsensusScorer {
    fn score(&self, responses: &[AgentResponse]) -> (f64, Vec<String>) {
        if responses.is_empty() {
            return (0.0, Vec::new());
        }

        let confidences: Vec<f64> = responses.iter().map(|r| r.confidence).collect();
        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
        let max = confidences.iter().cloned().fold(f64::MIN, f64::max);
        let min = confidences.iter().cloned().fold(f64::MAX, f64::min);
        let spread = (max - min).max(0.0);
        let agreement = clamp01(1.0 - spread);
        let consensus = clamp01(mean * 0.6 + agreement * 0.4);

        let max_insights = if self.max_insights == 0 { 5 } else { self.max_insights };
        let mut ranked: Vec<&AgentResponse> = responses.iter().collect();
        ranked.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

        let mut insights = Vec::new();
        for response in ranked {
            if insights.len() >= max_insights {
                break;
            }
            for argument in &response.arguments {
                if insights.len() >= max_insights {
                    break;
                }
                insights.push(argument.clone());
            }
            for suggestion in &response.suggestions {
                if insights.len() >= max_insights {
                    break;
                }
                insights.push(suggestion.clone());
            }
        }
        (consensus, insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentId, AgentRole};
    use std::time::{Duration, SystemTime};

    fn response(confidence: f64, arguments: Vec<&str>) -> AgentResponse {
        AgentResponse {
            agent_id: AgentId::new(),
            role: AgentRole::Proposer,
            provider: "p".to_string(),
            model: "m".to_string(),
            content: "c".to_string(),
            confidence,
            score: 7.0,
            latency: Duration::from_millis(100),
            arguments: arguments.into_iter().map(String::from).collect(),
            criticisms: Vec::new(),
            suggestions: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn empty_responses_yield_zero_consensus() {
        let scorer = HeuristicConsensusScorer::default();
        let (consensus, insights) = scorer.score(&[]);
        assert_eq!(consensus, 0.0);
        assert!(insights.is_empty());
    }

    #[test]
    fn uniform_high_confidence_yields_high_consensus() {
        let scorer = HeuristicConsensusScorer::new(5);
        let responses = vec![response(0.9, vec!["a"]), response(0.9, vec!["b"])];
        let (consensus, _) = scorer.score(&responses);
        assert!(consensus > 0.85);
    }

    #[test]
    fn wide_confidence_spread_lowers_consensus_relative_to_mean() {
        let scorer = HeuristicConsensusScorer::new(5);
        let responses = vec![response(0.1, vec![]), response(0.9, vec![])];
        let (consensus, _) = scorer.score(&responses);
        let mean = 0.5;
        assert!(consensus < mean);
    }

    #[test]
    fn insights_are_capped_at_max_insights() {
        let scorer = HeuristicConsensusScorer::new(2);
        let responses = vec![response(0.9, vec!["a", "b", "c"])];
        let (_, insights) = scorer.score(&responses);
        assert_eq!(insights.len(), 2);
    }
}
