//! sct-ci - Continuous integration harness for the Spinal Cord Toolbox
//!
//! Runs the distribution's CI pipeline as five strictly sequential,
//! fail-fast stages:
//! - bootstrap: non-interactive source install, load the environment profile
//! - verify: every catalogued command resolves on the search path
//! - test: full suite under multi-process coverage instrumentation
//! - combine: merge per-worker coverage fragments (informational)
//! - lint: error-only static analysis gate over first-party sources

pub mod catalogue;
pub mod coverage;
pub mod env;
pub mod error;
pub mod lint;
pub mod pipeline;
pub mod plan;
pub mod runner;
pub mod stage;
pub mod telemetry;
pub mod testrun;

// Re-export key types
pub use catalogue::{verify_tools, ToolCheck, VerifyStage, TOOL_CATALOGUE};
pub use coverage::{CombineStage, CoverageDatabase, CoverageFragment, CoverageLayout};
pub use env::{Bootstrapper, EnvConfig, InstallSpec};
pub use error::{PipelineError, Result};
pub use lint::{LintFilter, LintOutcome, LintPlan, LintStage};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use plan::RunPlan;
pub use runner::ExecResult;
pub use stage::{GateDecision, Stage, StageReport};
pub use telemetry::init_logging;
pub use testrun::TestRunStage;
