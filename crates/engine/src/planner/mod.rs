//! C6: Cognitive planner — the Expectation → Comparison → Refinement loop
//! that adapts per-phase strategy across rounds. State lives behind
//! `parking_lot::RwLock`, matching the runtime's preference for `parking_lot`
//! over `std::sync` in hot read paths.

use crate::config::PlannerConfig;
use crate::types::{Agent, AgentId, AgentRole, Phase, PlannerError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Per-phase exponential moving average baseline.
#[derive(Debug, Clone)]
pub struct PhaseBaseline {
    pub avg_confidence: f64,
    pub avg_consensus: f64,
    pub avg_insights: f64,
    pub avg_latency: Duration,
    pub samples: u32,
}

impl Default for PhaseBaseline {
    fn default() -> Self {
        Self {
            avg_confidence: 0.6,
            avg_consensus: 0.6,
            avg_insights: 2.0,
            avg_latency: Duration::from_secs(5),
            samples: 0,
        }
    }
}

impl PhaseBaseline {
    fn update(&mut self, rate: f64, confidence: f64, consensus: f64, insights: f64, latency: Duration) {
        self.avg_confidence = self.avg_confidence * (1.0 - rate) + confidence * rate;
        self.avg_consensus = self.avg_consensus * (1.0 - rate) + consensus * rate;
        self.avg_insights = self.avg_insights * (1.0 - rate) + insights * rate;
        let latency_secs = self.avg_latency.as_secs_f64() * (1.0 - rate) + latency.as_secs_f64() * rate;
        self.avg_latency = Duration::from_secs_f64(latency_secs.max(0.0));
        self.samples += 1;
    }
}

/// A recurring pattern extracted from comparisons. Bounded collection,
/// evicted by lowest impact×frequency when it grows past `max_history_size`.
#[derive(Debug, Clone)]
pub struct LearningInsight {
    pub pattern: String,
    pub confidence: f64,
    pub frequency: u32,
    pub impact: f64,
    pub source: String,
    pub last_seen: SystemTime,
}

/// Observed outcome of running a phase, fed into `compare`.
#[derive(Debug, Clone)]
pub struct ActualMetrics {
    pub confidence: f64,
    pub consensus: f64,
    pub insights: u32,
    pub latency: Duration,
}

/// What the planner predicted before a phase ran.
#[derive(Debug, Clone)]
pub struct Expectation {
    pub phase: Phase,
    pub round: u32,
    pub expected_confidence: f64,
    pub expected_consensus: f64,
    pub expected_insights: u32,
    pub expected_latency: Duration,
    pub goals: Vec<String>,
    pub risks: Vec<String>,
}

/// Actual vs expected, scored.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub phase: Phase,
    pub round: u32,
    pub confidence_delta: f64,
    pub consensus_delta: f64,
    pub insights_delta: f64,
    pub latency_delta_ms: f64,
    pub overall_score: f64,
    pub goals_achieved: Vec<String>,
    pub goals_missed: Vec<String>,
    pub risks_realized: Vec<String>,
    pub unexpected_outcomes: Vec<String>,
}

/// Strategy adjustment derived from a comparison.
#[derive(Debug, Clone, Default)]
pub struct Refinement {
    pub phase: Option<Phase>,
    pub confidence_adjustment: f64,
    pub agent_priority: HashMap<AgentId, f64>,
    pub role_emphasis: HashMap<AgentRole, f64>,
    pub new_goals: Vec<String>,
    pub mitigation_strategies: Vec<String>,
    pub success_patterns: Vec<String>,
    pub failure_patterns: Vec<String>,
    pub learning_insights: Vec<LearningInsight>,
}

/// Aggregate counters surfaced for observability and the meta-cognitive pass.
#[derive(Debug, Clone, Default)]
pub struct PlanningMetrics {
    pub total_expectations: u64,
    pub total_comparisons: u64,
    pub total_refinements: u64,
}

/// Output of an optional meta-cognitive reflection pass.
#[derive(Debug, Clone, Default)]
pub struct MetaReflection {
    pub expectation_accuracy: f64,
    pub refinement_effectiveness: f64,
    pub top_success_patterns: Vec<String>,
    pub recommendations: Vec<String>,
}

struct PlannerState {
    baselines: HashMap<Phase, PhaseBaseline>,
    insights: Vec<LearningInsight>,
    overall_scores: Vec<f64>,
    metrics: PlanningMetrics,
}

/// Per-phase fixed goal list. Goals are checked by exact string match against
/// the caller-reported `goals_achieved` set.
fn phase_goals(phase: Phase) -> Vec<String> {
    let base: &[&str] = match phase {
        Phase::Dehallucination => &["Flag unsupported claims"],
        Phase::SelfEvolvement => &["Incorporate prior lessons"],
        Phase::Proposal => &["Generate a concrete proposal", "Cover stated requirements"],
        Phase::Critique => &["Identify weaknesses", "Avoid redundant criticism"],
        Phase::Review => &["Assess correctness", "Assess completeness"],
        Phase::Optimization => &["Improve efficiency", "Preserve correctness"],
        Phase::Adversarial => &["Surface edge-case failures"],
        Phase::Convergence => &["Reach consensus"],
    };
    base.iter().map(|s| s.to_string()).collect()
}

fn phase_relevant_roles(phase: Phase) -> &'static [AgentRole] {
    crate::topology::preferred_roles(phase)
}

/// Thread-safe cognitive planner: owns phase baselines and the bounded
/// learning-insight history, all behind a single internal lock.
pub struct CognitivePlanner {
    config: PlannerConfig,
    state: RwLock<PlannerState>,
}

impl CognitivePlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(PlannerState {
                baselines: HashMap::new(),
                insights: Vec::new(),
                overall_scores: Vec::new(),
                metrics: PlanningMetrics::default(),
            }),
        }
    }

    pub fn metrics(&self) -> PlanningMetrics {
        self.state.read().metrics.clone()
    }

    pub fn baseline(&self, phase: Phase) -> PhaseBaseline {
        self.state
            .read()
            .baselines
            .get(&phase)
            .cloned()
            .unwrap_or_default()
    }

    /// SetExpectation — see module docs for the formula.
    pub fn set_expectation(&self, phase: Phase, round: u32, agents: &[Agent]) -> Expectation {
        let mut state = self.state.write();
        let baseline = state.baselines.entry(phase).or_default().clone();

        let mean_score = if agents.is_empty() {
            7.0
        } else {
            agents.iter().map(|a| a.score).sum::<f64>() / agents.len() as f64
        };
        let score_adj = (mean_score - 7.0) / 10.0;

        let learning_adj = state
            .insights
            .iter()
            .filter(|i| i.impact > 0.0)
            .map(|i| i.impact * i.confidence * 0.01)
            .sum::<f64>()
            .min(0.1);

        let expected_confidence = (baseline.avg_confidence + score_adj + learning_adj).min(1.0);
        let expected_consensus = (baseline.avg_consensus + score_adj * 0.5).min(1.0);
        let expected_insights = (baseline.avg_insights * (1.0 + score_adj)).floor().max(0.0) as u32;

        let risks = derive_risks(phase, agents);

        state.metrics.total_expectations += 1;

        Expectation {
            phase,
            round,
            expected_confidence: crate::types::clamp01(expected_confidence),
            expected_consensus: crate::types::clamp01(expected_consensus),
            expected_insights,
            expected_latency: baseline.avg_latency,
            goals: phase_goals(phase),
            risks,
        }
    }

    /// Compare — actual vs expected, with baseline EMA update and learning
    /// insight extraction.
    pub fn compare(
        &self,
        expectation: &Expectation,
        actual: &ActualMetrics,
        goals_achieved: &[String],
        unexpected_outcomes: &[String],
    ) -> Comparison {
        let mut state = self.state.write();

        let confidence_delta = actual.confidence - expectation.expected_confidence;
        let consensus_delta = actual.consensus - expectation.expected_consensus;
        let insights_delta = actual.insights as f64 - expectation.expected_insights as f64;
        let latency_delta_ms = crate::types::duration_ms(actual.latency)
            - crate::types::duration_ms(expectation.expected_latency);

        let confidence_sub = (0.5 + confidence_delta).clamp(0.0, 1.0);
        let consensus_sub = (0.5 + consensus_delta).clamp(0.0, 1.0);
        let insights_sub = (0.5 + insights_delta * 0.1).clamp(0.0, 1.0);
        let latency_sub = (0.5 - latency_delta_ms / 60_000.0).clamp(0.0, 1.0);

        let overall_score =
            0.3 * confidence_sub + 0.3 * consensus_sub + 0.2 * insights_sub + 0.2 * latency_sub;

        let goals_missed: Vec<String> = expectation
            .goals
            .iter()
            .filter(|g| !goals_achieved.contains(g))
            .cloned()
            .collect();

        let outcome_prefixes: Vec<String> = unexpected_outcomes
            .iter()
            .map(|o| prefix5(o))
            .collect();
        let risks_realized: Vec<String> = expectation
            .risks
            .iter()
            .filter(|r| outcome_prefixes.contains(&prefix5(r)))
            .cloned()
            .collect();

        let rate = self.config.adaptation_rate;
        state
            .baselines
            .entry(expectation.phase)
            .or_default()
            .update(rate, actual.confidence, actual.consensus, actual.insights as f64, actual.latency);

        if self.config.enable_learning {
            record_insight(&mut state.insights, expectation.phase, overall_score, self.config.max_history_size);
        }

        state.metrics.total_comparisons += 1;
        state.overall_scores.push(overall_score);

        debug!(phase = %expectation.phase, overall_score, "planner compare");

        Comparison {
            phase: expectation.phase,
            round: expectation.round,
            confidence_delta,
            consensus_delta,
            insights_delta,
            latency_delta_ms,
            overall_score,
            goals_achieved: goals_achieved.to_vec(),
            goals_missed,
            risks_realized,
            unexpected_outcomes: unexpected_outcomes.to_vec(),
        }
    }

    /// Refine — strategy adjustment derived from a comparison.
    pub fn refine(&self, comparison: &Comparison, agents: &[Agent]) -> Refinement {
        let state = self.state.read();

        let confidence_adjustment = comparison.confidence_delta * self.config.adaptation_rate;

        let multiplier = if comparison.overall_score > 0.7 {
            1.1
        } else if comparison.overall_score < 0.3 {
            0.9
        } else {
            1.0
        };
        let agent_priority: HashMap<AgentId, f64> = agents
            .iter()
            .map(|a| (a.id, multiplier * (0.5 + 0.5 * a.confidence)))
            .collect();

        let mut role_emphasis = HashMap::new();
        if comparison.overall_score < 0.5 {
            for &role in phase_relevant_roles(comparison.phase) {
                role_emphasis.insert(role, 1.5);
            }
        }

        let new_goals = comparison
            .goals_missed
            .iter()
            .map(|g| format!("Retry: {g}"))
            .collect();
        let mitigation_strategies = comparison
            .risks_realized
            .iter()
            .map(|r| format!("Mitigate: {r}"))
            .collect();

        let mut success_patterns = Vec::new();
        let mut failure_patterns = Vec::new();
        if comparison.overall_score > 0.7 {
            if comparison.confidence_delta > 0.0 {
                success_patterns.push("confidence exceeded expectation".to_string());
            }
            if comparison.consensus_delta > 0.0 {
                success_patterns.push("consensus exceeded expectation".to_string());
            }
        }
        if comparison.overall_score < 0.3 {
            if comparison.confidence_delta < 0.0 {
                failure_patterns.push("confidence fell short of expectation".to_string());
            }
            if comparison.consensus_delta < 0.0 {
                failure_patterns.push("consensus fell short of expectation".to_string());
            }
        }

        let mut recent: Vec<LearningInsight> = state.insights.clone();
        recent.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        recent.truncate(5);

        drop(state);
        self.state.write().metrics.total_refinements += 1;

        Refinement {
            phase: Some(comparison.phase),
            confidence_adjustment,
            agent_priority,
            role_emphasis,
            new_goals,
            mitigation_strategies,
            success_patterns,
            failure_patterns,
            learning_insights: recent,
        }
    }

    /// Meta-cognitive reflection: an optional self-assessment pass over the
    /// planner's own track record.
    pub fn reflect(&self) -> Result<MetaReflection, PlannerError> {
        if !self.config.enable_meta_cognition {
            return Err(PlannerError::NoBaseline("meta-cognition disabled".to_string()));
        }
        let state = self.state.read();
        if state.overall_scores.is_empty() {
            return Err(PlannerError::NoBaseline("no comparisons recorded".to_string()));
        }

        let expectation_accuracy =
            state.overall_scores.iter().sum::<f64>() / state.overall_scores.len() as f64;

        let improving = state
            .overall_scores
            .windows(2)
            .filter(|w| w[1] > w[0])
            .count();
        let pairs = state.overall_scores.len().saturating_sub(1).max(1);
        let refinement_effectiveness = improving as f64 / pairs as f64;

        let mut by_frequency: Vec<&LearningInsight> =
            state.insights.iter().filter(|i| i.impact > 0.0).collect();
        by_frequency.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        let top_success_patterns = by_frequency
            .into_iter()
            .take(3)
            .map(|i| i.pattern.clone())
            .collect();

        let mut recommendations = Vec::new();
        if expectation_accuracy < 0.5 {
            recommendations.push("expectation accuracy is low; recalibrate phase baselines".to_string());
        }
        if refinement_effectiveness < 0.3 {
            recommendations.push("refinements are not improving outcomes; revisit role emphasis policy".to_string());
        }
        if (state.insights.len() as f64) < (state.overall_scores.len() as f64 / 2.0) {
            recommendations.push("insight extraction rate is low relative to comparisons".to_string());
        }

        Ok(MetaReflection {
            expectation_accuracy,
            refinement_effectiveness,
            top_success_patterns,
            recommendations,
        })
    }
}

fn prefix5(s: &str) -> String {
    s.chars().take(5).collect()
}

fn derive_risks(phase: Phase, agents: &[Agent]) -> Vec<String> {
    let mut risks = Vec::new();

    let distinct_roles: std::collections::HashSet<AgentRole> = agents.iter().map(|a| a.role).collect();
    if agents.len() > 1 && distinct_roles.len() == 1 {
        risks.push("low diversity: all agents share one role".to_string());
    }

    if !agents.is_empty() {
        let mean = agents.iter().map(|a| a.confidence).sum::<f64>() / agents.len() as f64;
        let variance = agents
            .iter()
            .map(|a| (a.confidence - mean).powi(2))
            .sum::<f64>()
            / agents.len() as f64;
        if variance > 0.05 {
            risks.push("wide confidence spread across agents".to_string());
        }
    }

    let generic = match phase {
        Phase::Proposal => "propo incomplete requirement coverage",
        Phase::Critique => "critq criticism may be superficial",
        Phase::Review => "revie reviewers may miss defects",
        Phase::Optimization => "optim changes may regress correctness",
        Phase::Adversarial => "advrs adversarial probes may be shallow",
        Phase::Convergence => "conve consensus may be premature",
        Phase::Dehallucination => "dehal unsupported claims may slip through",
        Phase::SelfEvolvement => "selfe lessons may not transfer",
    };
    risks.push(generic.to_string());
    risks
}

fn record_insight(insights: &mut Vec<LearningInsight>, phase: Phase, overall_score: f64, max_history: usize) {
    let classification = if overall_score > 0.7 {
        "Success"
    } else if overall_score < 0.3 {
        "Struggle"
    } else {
        "Normal"
    };
    let pattern = format!("{classification} in {} phase", phase.as_str());
    let impact = if overall_score > 0.7 {
        1.0
    } else if overall_score < 0.3 {
        -1.0
    } else {
        0.0
    };

    if let Some(existing) = insights.iter_mut().find(|i| i.pattern == pattern) {
        existing.frequency += 1;
        existing.confidence = (existing.confidence + overall_score) / 2.0;
        existing.last_seen = crate::types::now();
        return;
    }

    insights.push(LearningInsight {
        pattern,
        confidence: overall_score,
        frequency: 1,
        impact,
        source: format!("{}", phase),
        last_seen: crate::types::now(),
    });

    if insights.len() > max_history {
        let worst_idx = insights
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.impact.abs() * a.frequency as f64)
                    .partial_cmp(&(b.impact.abs() * b.frequency as f64))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);
        if let Some(idx) = worst_idx {
            insights.remove(idx);
        }
    }
}
