//! The immutable description of one pipeline run.

use crate::catalogue::TOOL_CATALOGUE;
use crate::coverage::CoverageLayout;
use crate::env::InstallSpec;
use crate::lint::LintPlan;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything one run needs, fixed at construction.
///
/// Defaults describe the distribution's own CI: non-interactive source
/// install, the full tool catalogue, `pytest` under coverage, and the
/// error-only lint pass over first-party sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    /// Working directory: checkout root, coverage artifacts live here.
    pub workdir: PathBuf,

    pub install: InstallSpec,

    /// Tool catalogue to verify, in order.
    pub tools: Vec<String>,

    /// Test framework invocation.
    pub test_command: Vec<String>,

    pub coverage: CoverageLayout,

    pub lint: LintPlan,
}

impl RunPlan {
    pub fn for_workdir(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        Self {
            install: InstallSpec {
                installer: vec!["./install_sct".to_string(), "-y".to_string()],
                profile: workdir.join("sct_env.sh"),
                env_name: "venv_sct".to_string(),
            },
            tools: TOOL_CATALOGUE.iter().map(|s| s.to_string()).collect(),
            test_command: vec!["pytest".to_string()],
            coverage: CoverageLayout::in_workdir(&workdir),
            lint: LintPlan::default(),
            workdir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_covers_the_whole_catalogue() {
        let plan = RunPlan::for_workdir("/work");
        assert_eq!(plan.tools.len(), TOOL_CATALOGUE.len());
        assert_eq!(plan.test_command, vec!["pytest"]);
        assert!(plan.install.installer.contains(&"-y".to_string()));
    }

    #[test]
    fn plan_round_trips_through_json() {
        let plan = RunPlan::for_workdir("/work");
        let text = serde_json::to_string(&plan).unwrap();
        let back: RunPlan = serde_json::from_str(&text).unwrap();
        assert_eq!(back.workdir, plan.workdir);
        assert_eq!(back.tools, plan.tools);
    }
}
