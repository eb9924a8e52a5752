//! Pipeline orchestration: bootstrap, then the ordered gated stages,
//! fail-fast on the first non-success decision.

use crate::catalogue::VerifyStage;
use crate::coverage::CombineStage;
use crate::env::Bootstrapper;
use crate::lint::LintStage;
use crate::plan::RunPlan;
use crate::stage::{GateDecision, Stage, StageReport};
use crate::testrun::TestRunStage;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Result of a complete pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Identifier for this run's log lines; nothing persists across runs.
    pub run_id: String,

    /// Whether every stage's gate decision was success.
    pub success: bool,

    /// Reports for the stages that ran, in order.
    pub stages: Vec<StageReport>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineOutcome {
    /// Process exit code: bitwise-OR of failing stages' codes. Execution
    /// halts at the first failure, so in practice this is that stage's
    /// code, and 0 for a fully green run.
    pub fn exit_code(&self) -> i32 {
        let code = self
            .stages
            .iter()
            .filter(|s| !s.passed)
            .fold(0, |acc, s| acc | s.exit_code);
        if !self.success && code == 0 {
            1
        } else {
            code
        }
    }

    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed).count()
    }
}

/// Pipeline orchestrator.
pub struct Pipeline;

impl Pipeline {
    /// Execute the five stages in order.
    ///
    /// Bootstrap produces the [`EnvConfig`](crate::env::EnvConfig) every
    /// later stage reads; the gated stages then run sequentially with
    /// early termination. No stage result is ever overridden by a later
    /// stage, and nothing is retried.
    pub async fn run(plan: &RunPlan) -> PipelineOutcome {
        let run_id = Uuid::new_v4().to_string();
        let start = Instant::now();
        info!(run_id = %run_id, workdir = %plan.workdir.display(), "starting CI pipeline");

        let mut reports = Vec::new();

        let stage_start = Instant::now();
        let env = match Bootstrapper::run(&plan.install, &plan.workdir).await {
            Ok(env) => {
                reports.push(StageReport::pass(
                    "bootstrap",
                    stage_start.elapsed().as_millis() as u64,
                ));
                env
            }
            Err(e) => {
                error!(stage = "bootstrap", error = %e, "stage failed");
                reports.push(StageReport::fail(
                    "bootstrap",
                    e.exit_code(),
                    stage_start.elapsed().as_millis() as u64,
                ));
                return Self::outcome(run_id, false, reports, start);
            }
        };

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(VerifyStage {
                tools: plan.tools.clone(),
            }),
            Box::new(TestRunStage {
                command: plan.test_command.clone(),
                layout: plan.coverage.clone(),
            }),
            Box::new(CombineStage {
                layout: plan.coverage.clone(),
            }),
            Box::new(LintStage {
                plan: plan.lint.clone(),
            }),
        ];

        for stage in stages {
            let name = stage.name();
            let stage_start = Instant::now();
            info!(stage = name, "executing stage");

            let decision = match stage.run(&env).await {
                Ok(decision) => decision,
                Err(e) => {
                    error!(stage = name, error = %e, "stage execution error");
                    GateDecision::fail(e.exit_code(), e.to_string())
                }
            };
            let duration_ms = stage_start.elapsed().as_millis() as u64;

            match decision {
                GateDecision::Pass => {
                    info!(stage = name, duration_ms, "stage passed");
                    reports.push(StageReport::pass(name, duration_ms));
                }
                GateDecision::Fail { exit_code, reason } => {
                    error!(stage = name, exit_code, %reason, "stage failed; aborting pipeline");
                    reports.push(StageReport::fail(name, exit_code, duration_ms));
                    return Self::outcome(run_id, false, reports, start);
                }
            }
        }

        Self::outcome(run_id, true, reports, start)
    }

    fn outcome(
        run_id: String,
        success: bool,
        stages: Vec<StageReport>,
        start: Instant,
    ) -> PipelineOutcome {
        let duration_ms = start.elapsed().as_millis() as u64;
        if success {
            info!(run_id = %run_id, duration_ms, "CI pipeline completed successfully");
        } else {
            info!(run_id = %run_id, duration_ms, "CI pipeline failed");
        }
        PipelineOutcome {
            run_id,
            success,
            stages,
            duration_ms,
        }
    }
}
