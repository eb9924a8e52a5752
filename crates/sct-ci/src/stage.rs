//! Stage abstraction and gate decisions.
//!
//! The pipeline is an ordered list of [`Stage`] values. Each stage reads
//! the immutable [`EnvConfig`] and contributes exactly one
//! [`GateDecision`]; the orchestrator short-circuits on the first failure.

use crate::env::EnvConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Binary outcome a stage contributes to the overall run status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum GateDecision {
    /// Stage passed; the pipeline continues.
    Pass,

    /// Stage failed; the pipeline stops here.
    Fail { exit_code: i32, reason: String },
}

impl GateDecision {
    pub fn fail(exit_code: i32, reason: impl Into<String>) -> Self {
        GateDecision::Fail {
            exit_code,
            reason: reason.into(),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, GateDecision::Pass)
    }
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable stage name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Execute the stage against the run environment.
    ///
    /// `Err` means the stage could not run at all (spawn failure, I/O);
    /// the orchestrator treats that as a failed gate, never a panic.
    async fn run(&self, env: &EnvConfig) -> Result<GateDecision>;
}

/// Per-stage record kept in the run outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub stage_name: String,

    /// Whether the stage's gate decision was success.
    pub passed: bool,

    /// Exit code the stage contributed (0 on success).
    pub exit_code: i32,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StageReport {
    pub fn pass(name: &str, duration_ms: u64) -> Self {
        Self {
            stage_name: name.to_string(),
            passed: true,
            exit_code: 0,
            duration_ms,
        }
    }

    pub fn fail(name: &str, exit_code: i32, duration_ms: u64) -> Self {
        Self {
            stage_name: name.to_string(),
            passed: false,
            exit_code,
            duration_ms,
        }
    }
}
