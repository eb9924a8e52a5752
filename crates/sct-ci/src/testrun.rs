//! Instrumented test execution.
//!
//! Prepares the coverage instrumentation artifacts, points the engine at
//! them through its environment variables, then hands the whole test
//! discovery-and-run cycle to the external framework. The suite's exit
//! status is this stage's gate decision: one failing test fails the run.

use crate::coverage::CoverageLayout;
use crate::env::EnvConfig;
use crate::error::Result;
use crate::runner;
use crate::stage::{GateDecision, Stage};
use async_trait::async_trait;
use tracing::{debug, error, info};

pub struct TestRunStage {
    /// Test framework invocation (default `pytest`).
    pub command: Vec<String>,

    pub layout: CoverageLayout,
}

#[async_trait]
impl Stage for TestRunStage {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn run(&self, env: &EnvConfig) -> Result<GateDecision> {
        self.layout.write_instrumentation()?;
        let env = env.with_vars(self.layout.engine_env());

        info!(command = %self.command.join(" "), "running test suite under coverage");
        let exec = runner::run_command(&self.command, &env).await?;
        debug!(duration_ms = exec.duration_ms, "test suite finished");

        if exec.success {
            Ok(GateDecision::Pass)
        } else {
            error!(status = exec.exit_code, "test suite failed");
            if !exec.stdout.is_empty() {
                error!("test output:\n{}", exec.stdout);
            }
            if !exec.stderr.is_empty() {
                error!("test errors:\n{}", exec.stderr);
            }
            Ok(GateDecision::fail(
                exec.exit_code,
                format!("test suite exited with status {}", exec.exit_code),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn passing_suite_yields_pass() {
        let dir = tempfile::tempdir().unwrap();
        let stage = TestRunStage {
            command: argv(&["true"]),
            layout: CoverageLayout::in_workdir(dir.path()),
        };
        let env = EnvConfig::new(dir.path());

        let decision = stage.run(&env).await.unwrap();
        assert!(decision.passed());

        // Instrumentation artifacts were written before the suite ran.
        assert!(stage.layout.rcfile.exists());
        assert!(stage.layout.hook_file.exists());
    }

    #[tokio::test]
    async fn one_failing_test_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let stage = TestRunStage {
            command: argv(&["false"]),
            layout: CoverageLayout::in_workdir(dir.path()),
        };
        let env = EnvConfig::new(dir.path());

        let decision = stage.run(&env).await.unwrap();
        match decision {
            GateDecision::Fail { exit_code, .. } => assert_ne!(exit_code, 0),
            GateDecision::Pass => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn engine_vars_reach_the_suite() {
        let dir = tempfile::tempdir().unwrap();
        let probe = dir.path().join("probe.txt");
        let stage = TestRunStage {
            command: argv(&[
                "sh",
                "-c",
                &format!("echo \"$COVERAGE_PROCESS_START:$COVERAGE_FILE\" > {}", probe.display()),
            ]),
            layout: CoverageLayout::in_workdir(dir.path()),
        };
        let env = EnvConfig::new(dir.path());

        let decision = stage.run(&env).await.unwrap();
        assert!(decision.passed());

        let seen = std::fs::read_to_string(&probe).unwrap();
        assert!(seen.contains(".coveragerc"));
        assert!(seen.contains(".coverage"));
    }
}
