//! Isolated execution of a (test, solution) pair. Selects docker or podman
//! by binary presence at startup; a `SandboxRunner` trait keeps the engine
//! decoupled from any one container runtime, mirroring the invoker's
//! provider-abstraction pattern.

use super::generator::TestCase;
use super::Solution;
use crate::config::SandboxConfig as EngineSandboxConfig;
use crate::types::SandboxError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

pub use crate::config::SandboxConfig;

#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    pub cpu_time: Duration,
    pub memory_used_mb: u64,
    pub memory_peak_mb: u64,
    pub process_count: u32,
    pub thread_count: u32,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub test_id: String,
    pub solution_id: String,
    pub passed: bool,
    pub duration: Duration,
    pub output: String,
    pub error: Option<String>,
    pub exit_code: i32,
    pub metrics: ExecutionMetrics,
}

#[async_trait]
pub trait SandboxRunner: Send + Sync {
    async fn run(
        &self,
        test: &TestCase,
        solution: &Solution,
        config: &EngineSandboxConfig,
    ) -> ExecutionResult;
}

/// Which container runtime is available on this host, detected once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    pub fn binary(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }

    /// Probes `PATH` for `docker` then `podman`.
    pub fn detect() -> Result<Self, SandboxError> {
        for (runtime, bin) in [(ContainerRuntime::Docker, "docker"), (ContainerRuntime::Podman, "podman")] {
            if which(bin) {
                return Ok(runtime);
            }
        }
        Err(SandboxError::NoRuntime)
    }
}

fn which(bin: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file())
        })
        .unwrap_or(false)
}

fn runner_script(language: &str) -> Option<&'static str> {
    match language {
        "python" => Some("python -m pytest -q"),
        "rust" => Some("cargo test --quiet"),
        "javascript" | "typescript" => Some("node test.js"),
        "go" => Some("go test ./..."),
        _ => None,
    }
}

/// Real container-backed runner. Writes the test and solution to a working
/// directory, then runs a per-language test command inside the container
/// with resource limits applied.
pub struct ContainerSandboxRunner {
    runtime: ContainerRuntime,
    work_dir: std::path::PathBuf,
}

impl ContainerSandboxRunner {
    pub fn new(work_dir: impl Into<std::path::PathBuf>) -> Result<Self, SandboxError> {
        Ok(Self {
            runtime: ContainerRuntime::detect()?,
            work_dir: work_dir.into(),
        })
    }
}

#[async_trait]
impl SandboxRunner for ContainerSandboxRunner {
    async fn run(&self, test: &TestCase, solution: &Solution, config: &EngineSandboxConfig) -> ExecutionResult {
        let started = std::time::Instant::now();

        let Some(script) = runner_script(&test.language) else {
            return ExecutionResult {
                test_id: test.id.clone(),
                solution_id: solution.id.clone(),
                passed: false,
                duration: started.elapsed(),
                output: String::new(),
                error: Some(format!("no test runner for language {}", test.language)),
                exit_code: 1,
                metrics: ExecutionMetrics::default(),
            };
        };

        let mut args: Vec<String> = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--memory".to_string(),
            format!("{}m", config.memory_limit_mb),
            "--cpus".to_string(),
            config.cpu_limit.to_string(),
        ];
        if !config.network_allowed {
            args.push("--network=none".to_string());
        }
        args.push("-v".to_string());
        args.push(format!("{}:/workspace", self.work_dir.display()));
        args.push("-w".to_string());
        args.push("/workspace".to_string());
        args.push(image_for_language(&test.language).to_string());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push(script.to_string());

        let mut command = Command::new(self.runtime.binary());
        command.args(&args).stdout(Stdio::piped()).stderr(Stdio::piped());

        let run_future = command.output();
        match timeout(config.timeout, run_future).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let passed = infer_pass(&stdout);
                ExecutionResult {
                    test_id: test.id.clone(),
                    solution_id: solution.id.clone(),
                    passed,
                    duration: started.elapsed(),
                    output: stdout,
                    error: if output.status.success() {
                        None
                    } else {
                        Some(String::from_utf8_lossy(&output.stderr).to_string())
                    },
                    exit_code: output.status.code().unwrap_or(-1),
                    metrics: ExecutionMetrics::default(),
                }
            }
            Ok(Err(e)) => ExecutionResult {
                test_id: test.id.clone(),
                solution_id: solution.id.clone(),
                passed: false,
                duration: started.elapsed(),
                output: String::new(),
                error: Some(e.to_string()),
                exit_code: 1,
                metrics: ExecutionMetrics::default(),
            },
            Err(_) => ExecutionResult {
                test_id: test.id.clone(),
                solution_id: solution.id.clone(),
                passed: false,
                duration: started.elapsed(),
                output: String::new(),
                error: Some("execution timeout".to_string()),
                exit_code: 124,
                metrics: ExecutionMetrics::default(),
            },
        }
    }
}

fn image_for_language(language: &str) -> &'static str {
    match language {
        "python" => "python:3.12-slim",
        "rust" => "rust:1-slim",
        "javascript" | "typescript" => "node:20-slim",
        "go" => "golang:1.22-slim",
        _ => "alpine:latest",
    }
}

fn infer_pass(stdout: &str) -> bool {
    let lower = stdout.to_lowercase();
    let has_fail_marker = lower.contains("fail") || lower.contains("error");
    let has_pass_marker = lower.contains("pass") || lower.contains("ok");
    has_pass_marker && !has_fail_marker
}

/// In-memory stand-in used by tests and examples: never spawns a process.
pub struct FakeSandboxRunner {
    always_pass: bool,
    fast_solution: Option<String>,
}

impl FakeSandboxRunner {
    pub fn always_pass() -> Self {
        Self {
            always_pass: true,
            fast_solution: None,
        }
    }

    pub fn faster_for(solution_id: impl Into<String>) -> Self {
        Self {
            always_pass: true,
            fast_solution: Some(solution_id.into()),
        }
    }
}

#[async_trait]
impl SandboxRunner for FakeSandboxRunner {
    async fn run(&self, test: &TestCase, solution: &Solution, _config: &EngineSandboxConfig) -> ExecutionResult {
        let duration = if self.fast_solution.as_deref() == Some(solution.id.as_str()) {
            Duration::from_millis(10)
        } else {
            Duration::from_millis(50)
        };
        ExecutionResult {
            test_id: test.id.clone(),
            solution_id: solution.id.clone(),
            passed: self.always_pass,
            duration,
            output: "ok".to_string(),
            error: None,
            exit_code: 0,
            metrics: ExecutionMetrics::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_pass_requires_pass_marker_without_fail() {
        assert!(infer_pass("3 passed, 0 failed"));
        assert!(!infer_pass("1 passed, 1 failed"));
        assert!(!infer_pass("error: could not compile"));
    }
}
