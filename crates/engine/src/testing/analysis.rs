//! Contrastive analysis over a round's executions: pairwise differences,
//! root-cause classification, and winner selection.

use super::generator::TestCase;
use super::sandbox::ExecutionResult;
use super::Solution;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceKind {
    Correctness,
    Performance,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Difference {
    pub test_id: String,
    pub solution_a: String,
    pub solution_b: String,
    pub kind: DifferenceKind,
    pub significance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootCauseKind {
    Performance,
    LogicError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct RootCause {
    pub solution_id: String,
    pub test_id: String,
    pub description: String,
    pub kind: RootCauseKind,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct ContrastiveAnalysis {
    pub differences: Vec<Difference>,
    pub root_causes: Vec<RootCause>,
    pub winner: Option<String>,
    pub confidence: f64,
}

/// Performs pairwise correctness/performance/memory comparison across every
/// test's executions, classifies failures into root causes, and picks the
/// solution that passed everything with the lowest mean duration.
pub fn analyze(
    tests: &[TestCase],
    executions: &[ExecutionResult],
    solutions: &[Solution],
) -> ContrastiveAnalysis {
    let mut differences = Vec::new();
    let mut root_causes = Vec::new();

    for test in tests {
        let by_solution: Vec<&ExecutionResult> = executions
            .iter()
            .filter(|e| e.test_id == test.id)
            .collect();

        for i in 0..by_solution.len() {
            for j in (i + 1)..by_solution.len() {
                let a = by_solution[i];
                let b = by_solution[j];

                if a.passed != b.passed {
                    differences.push(Difference {
                        test_id: test.id.clone(),
                        solution_a: a.solution_id.clone(),
                        solution_b: b.solution_id.clone(),
                        kind: DifferenceKind::Correctness,
                        significance: 1.0,
                    });
                }

                let d1 = a.duration.as_secs_f64();
                let d2 = b.duration.as_secs_f64();
                if d1 > 0.0 && d2 > 0.0 {
                    let ratio_delta = (1.0 - d1 / d2).abs();
                    if ratio_delta > 0.1 {
                        differences.push(Difference {
                            test_id: test.id.clone(),
                            solution_a: a.solution_id.clone(),
                            solution_b: b.solution_id.clone(),
                            kind: DifferenceKind::Performance,
                            significance: ratio_delta.min(1.0),
                        });
                    }
                }

                let m1 = a.metrics.memory_peak_mb as f64;
                let m2 = b.metrics.memory_peak_mb as f64;
                if m1 > 0.0 && m2 > 0.0 {
                    let mem_delta = (1.0 - m1 / m2).abs();
                    if mem_delta > 0.2 {
                        differences.push(Difference {
                            test_id: test.id.clone(),
                            solution_a: a.solution_id.clone(),
                            solution_b: b.solution_id.clone(),
                            kind: DifferenceKind::Memory,
                            significance: mem_delta.min(1.0),
                        });
                    }
                }
            }
        }

        for exec in &by_solution {
            if exec.metrics.memory_peak_mb > 100 {
                root_causes.push(RootCause {
                    solution_id: exec.solution_id.clone(),
                    test_id: test.id.clone(),
                    description: format!(
                        "peak memory {}MB exceeds 100MB on test {}",
                        exec.metrics.memory_peak_mb, test.id
                    ),
                    kind: RootCauseKind::Performance,
                    severity: Severity::Medium,
                });
            }
            if exec.exit_code == 124 {
                root_causes.push(RootCause {
                    solution_id: exec.solution_id.clone(),
                    test_id: test.id.clone(),
                    description: format!("test {} timed out", test.id),
                    kind: RootCauseKind::Performance,
                    severity: Severity::High,
                });
            }
            if !exec.passed {
                if let Some(err) = exec.error.as_ref().filter(|e| !e.is_empty()) {
                    root_causes.push(RootCause {
                        solution_id: exec.solution_id.clone(),
                        test_id: test.id.clone(),
                        description: err.clone(),
                        kind: RootCauseKind::LogicError,
                        severity: Severity::High,
                    });
                }
            }
        }
    }

    let winner = pick_winner(solutions, executions);

    let mut confidence: f64 = 0.5;
    if !differences.is_empty() {
        confidence += 0.2;
    }
    if !root_causes.is_empty() {
        confidence += 0.2;
    }
    if winner.is_some() {
        confidence += 0.1;
    }
    confidence = confidence.min(1.0);

    ContrastiveAnalysis {
        differences,
        root_causes,
        winner,
        confidence,
    }
}

fn pick_winner(solutions: &[Solution], executions: &[ExecutionResult]) -> Option<String> {
    let mut totals: HashMap<&str, (std::time::Duration, usize, usize)> = HashMap::new();
    for solution in solutions {
        totals.insert(solution.id.as_str(), (std::time::Duration::ZERO, 0, 0));
    }
    for exec in executions {
        let entry = totals.entry(exec.solution_id.as_str()).or_default();
        entry.0 += exec.duration;
        entry.1 += 1;
        if exec.passed {
            entry.2 += 1;
        }
    }

    totals
        .into_iter()
        .filter(|(_, (_, total, passed))| *total > 0 && total == passed)
        .min_by(|(_, (dur_a, total_a, _)), (_, (dur_b, total_b, _))| {
            let mean_a = dur_a.as_secs_f64() / *total_a as f64;
            let mean_b = dur_b.as_secs_f64() / *total_b as f64;
            mean_a.partial_cmp(&mean_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(id, _)| id.to_string())
}
