//! Static analysis gate.
//!
//! Selects first-party sources from the tracked file list, runs an
//! error-only lint pass over them, and decodes the lint tool's
//! bit-encoded exit status into a typed [`LintOutcome`]. Only the
//! error-findings bit fails the run; fatal-tool and usage conditions are
//! not lint findings and must not be conflated with them.

use crate::env::EnvConfig;
use crate::error::Result;
use crate::runner;
use crate::stage::{GateDecision, Stage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Documented exit-status bit layout of the lint tool.
pub const FATAL_BIT: i32 = 1;
pub const ERROR_BIT: i32 = 2;
pub const USAGE_BIT: i32 = 32;

/// Path filter selecting the lint target set from the tracked file list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintFilter {
    /// First-party source directory prefixes.
    pub prefixes: Vec<String>,

    /// Source extension, without the dot.
    pub extension: String,
}

impl Default for LintFilter {
    fn default() -> Self {
        Self {
            prefixes: vec![
                "scripts/".to_string(),
                "spinalcordtoolbox/".to_string(),
                "testing/".to_string(),
            ],
            extension: "py".to_string(),
        }
    }
}

impl LintFilter {
    pub fn matches(&self, path: &str) -> bool {
        path.ends_with(&format!(".{}", self.extension))
            && self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Recompute the lint target set; derived data, never persisted.
    pub fn select<'a>(&self, tracked: impl Iterator<Item = &'a str>) -> Vec<String> {
        tracked
            .map(str::trim)
            .filter(|p| !p.is_empty() && self.matches(p))
            .map(str::to_string)
            .collect()
    }
}

/// Typed decoding of the lint tool's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LintOutcome {
    /// No error-level findings.
    Clean,

    /// Error-level findings were issued.
    Findings { status: i32 },

    /// The tool itself misbehaved (crash on a file, usage error). Not a
    /// lint finding.
    ToolError { status: i32 },
}

impl LintOutcome {
    /// Decode against the documented bit layout. Bits 4/8/16 are benign
    /// severity classes and cannot fail the gate.
    pub fn from_exit_status(status: i32) -> Self {
        if status == 0 {
            LintOutcome::Clean
        } else if status < 0 {
            // terminated by signal
            LintOutcome::ToolError { status }
        } else if status & ERROR_BIT != 0 {
            LintOutcome::Findings { status }
        } else if status & (FATAL_BIT | USAGE_BIT) != 0 {
            LintOutcome::ToolError { status }
        } else {
            LintOutcome::Clean
        }
    }
}

/// Configuration of the lint stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintPlan {
    /// Command producing the version-controlled file list.
    pub list_command: Vec<String>,

    /// Lint invocation; target paths are appended.
    pub lint_command: Vec<String>,

    pub filter: LintFilter,
}

impl Default for LintPlan {
    fn default() -> Self {
        Self {
            list_command: vec!["git".to_string(), "ls-files".to_string()],
            lint_command: vec![
                "pylint".to_string(),
                "--py3k".to_string(),
                "-E".to_string(),
            ],
            filter: LintFilter::default(),
        }
    }
}

pub struct LintStage {
    pub plan: LintPlan,
}

#[async_trait]
impl Stage for LintStage {
    fn name(&self) -> &'static str {
        "lint"
    }

    async fn run(&self, env: &EnvConfig) -> Result<GateDecision> {
        let tracked = runner::run_command(&self.plan.list_command, env).await?;
        if !tracked.success {
            error!(status = tracked.exit_code, stderr = %tracked.stderr, "failed to enumerate tracked files");
            return Ok(GateDecision::fail(
                tracked.exit_code,
                "failed to enumerate tracked files",
            ));
        }

        let targets = self.plan.filter.select(tracked.stdout.lines());
        if targets.is_empty() {
            info!("no lint targets selected");
            return Ok(GateDecision::Pass);
        }
        info!(targets = targets.len(), "running lint pass");

        let mut argv = self.plan.lint_command.clone();
        argv.extend(targets);
        let exec = runner::run_command(&argv, env).await?;

        match LintOutcome::from_exit_status(exec.exit_code) {
            LintOutcome::Clean => {
                info!("lint pass clean");
                Ok(GateDecision::Pass)
            }
            LintOutcome::ToolError { status } => {
                warn!(status, stderr = %exec.stderr, "lint tool condition, not a finding; gate passes");
                Ok(GateDecision::Pass)
            }
            LintOutcome::Findings { status } => {
                if !exec.stdout.is_empty() {
                    error!("lint findings:\n{}", exec.stdout);
                }
                Ok(GateDecision::fail(
                    status & ERROR_BIT,
                    "lint reported error-level findings",
                ))
            }
        }
    }
}
