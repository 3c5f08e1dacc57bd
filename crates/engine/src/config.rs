//! Configuration structs for every component, mirroring the environment/config
//! surface named in the specification. Each struct implements `Default` with
//! the documented constants and a `validate` that the orchestrator calls
//! before constructing any subsystem.

use crate::topology::TopologyKind;
use crate::types::{ConfigError, Phase};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Orchestrator-level defaults and policy toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub default_max_rounds: u32,
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    pub default_topology: TopologyKind,
    pub default_min_consensus: f64,
    pub min_agents_per_debate: usize,
    pub max_agents_per_debate: usize,
    pub enable_agent_diversity: bool,
    pub enable_learning: bool,
    pub enable_cross_debate_learning: bool,
    pub min_consensus_for_lesson: f64,
    pub voting_method: String,
    pub enable_confidence_weighting: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_max_rounds: 3,
            default_timeout: Duration::from_secs(600),
            default_topology: TopologyKind::Mesh,
            default_min_consensus: 0.8,
            min_agents_per_debate: 2,
            max_agents_per_debate: 16,
            enable_agent_diversity: true,
            enable_learning: true,
            enable_cross_debate_learning: false,
            min_consensus_for_lesson: 0.6,
            voting_method: "weighted".to_string(),
            enable_confidence_weighting: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_agents_per_debate < 1 {
            return Err(ConfigError::Invalid(
                "min_agents_per_debate must be at least 1".into(),
            ));
        }
        if self.max_agents_per_debate < self.min_agents_per_debate {
            return Err(ConfigError::Invalid(
                "max_agents_per_debate must be >= min_agents_per_debate".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_min_consensus) {
            return Err(ConfigError::Invalid(
                "default_min_consensus must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Cognitive planner tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub enable_learning: bool,
    pub expectation_threshold: f64,
    pub adaptation_rate: f64,
    pub max_history_size: usize,
    pub enable_meta_cognition: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enable_learning: true,
            expectation_threshold: 0.5,
            adaptation_rate: 0.3,
            max_history_size: 100,
            enable_meta_cognition: true,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.adaptation_rate) {
            return Err(ConfigError::Invalid(
                "adaptation_rate must be in [0, 1]".into(),
            ));
        }
        if self.max_history_size == 0 {
            return Err(ConfigError::Invalid(
                "max_history_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Topology construction and message-routing tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub kind: TopologyKind,
    pub max_parallelism: usize,
    #[serde(with = "humantime_serde")]
    pub message_timeout: Duration,
    pub enable_dynamic_roles: bool,
    pub enable_load_balancing: bool,
    pub priority_channels: bool,
    pub metadata: HashMap<String, String>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            kind: TopologyKind::Mesh,
            max_parallelism: 4,
            message_timeout: Duration::from_secs(30),
            enable_dynamic_roles: false,
            enable_load_balancing: false,
            priority_channels: false,
            metadata: HashMap::new(),
        }
    }
}

impl TopologyConfig {
    /// Bounded queue capacity per the concurrency model: ~1000 for mesh,
    /// ~500 for star/tree/chain.
    pub fn queue_capacity(&self) -> usize {
        match self.kind {
            TopologyKind::Mesh => 1000,
            TopologyKind::Star | TopologyKind::Chain | TopologyKind::Tree => 500,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallelism == 0 {
            return Err(ConfigError::Invalid(
                "max_parallelism must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Approval gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub enabled: bool,
    pub gate_points: Vec<Phase>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub notification_channels: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gate_points: Vec::new(),
            timeout: Duration::from_secs(30 * 60),
            notification_channels: Vec::new(),
        }
    }
}

impl GateConfig {
    pub fn is_gate_point(&self, phase: Phase) -> bool {
        self.enabled && self.gate_points.contains(&phase)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("gate timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Sandbox execution limits for the test-driven validation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Megabytes.
    pub memory_limit_mb: u64,
    pub cpu_limit: f64,
    pub network_allowed: bool,
    pub disk_allowed: bool,
    pub max_concurrent: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            memory_limit_mb: 256,
            cpu_limit: 1.0,
            network_allowed: false,
            disk_allowed: false,
            max_concurrent: 4,
        }
    }
}

impl SandboxConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(OrchestratorConfig::default().validate().is_ok());
        assert!(PlannerConfig::default().validate().is_ok());
        assert!(TopologyConfig::default().validate().is_ok());
        assert!(GateConfig::default().validate().is_ok());
        assert!(SandboxConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_agent_bounds() {
        let mut cfg = OrchestratorConfig::default();
        cfg.max_agents_per_debate = 1;
        cfg.min_agents_per_debate = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn queue_capacity_by_kind() {
        let mut cfg = TopologyConfig::default();
        cfg.kind = TopologyKind::Mesh;
        assert_eq!(cfg.queue_capacity(), 1000);
        cfg.kind = TopologyKind::Star;
        assert_eq!(cfg.queue_capacity(), 500);
    }
}
