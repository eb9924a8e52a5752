//! End-to-end pipeline tests against stub executables.
//!
//! A fake installer copies a prepared environment profile into place, a
//! stub tool directory stands in for the installed distribution, and the
//! test/lint stages run small shell commands with controlled exit codes.

#![cfg(unix)]

use sct_ci::{CoverageDatabase, Pipeline, RunPlan};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

fn sh(script: impl Into<String>) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.into()]
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    /// Workdir with a stub tool directory and a profile the fake
    /// installer copies into place.
    fn new(tools: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        for tool in tools {
            let path = bin.join(tool);
            std::fs::write(&path, "#!/bin/sh\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        std::fs::write(
            dir.path().join("profile.src"),
            format!(
                "export SCT_DIR={}\nexport PATH=\"{}:$PATH\"\n",
                dir.path().display(),
                bin.display()
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn workdir(&self) -> &Path {
        self.dir.path()
    }

    /// Plan with every external collaborator stubbed to succeed.
    fn plan(&self) -> RunPlan {
        let workdir: PathBuf = self.workdir().to_path_buf();
        let mut plan = RunPlan::for_workdir(&workdir);
        plan.install.installer = sh("cp profile.src sct_env.sh");
        plan.install.profile = workdir.join("sct_env.sh");
        plan.tools = vec!["sct_version".to_string()];
        plan.test_command = sh("exit 0");
        plan.lint.list_command = sh("echo scripts/sct_maths.py");
        plan.lint.lint_command = sh("exit 0");
        plan
    }
}

#[tokio::test]
async fn green_run_passes_every_stage() {
    let fixture = Fixture::new(&["sct_version"]);
    let plan = fixture.plan();

    let outcome = Pipeline::run(&plan).await;

    assert!(outcome.success, "pipeline should succeed");
    assert_eq!(outcome.stages.len(), 5);
    assert_eq!(outcome.passed_count(), 5);
    assert_eq!(outcome.exit_code(), 0);
    assert!(!outcome.run_id.is_empty());

    let names: Vec<&str> = outcome
        .stages
        .iter()
        .map(|s| s.stage_name.as_str())
        .collect();
    assert_eq!(names, vec!["bootstrap", "verify", "test", "combine", "lint"]);
}

#[tokio::test]
async fn coverage_fragments_are_merged_and_consumed() {
    let fixture = Fixture::new(&["sct_version"]);
    let mut plan = fixture.plan();
    // Two workers, disjoint line sets over the same source file.
    plan.test_command = sh(
        "printf '{\"files\":{\"scripts/sct_maths.py\":[1,2]}}' > .coverage.w1 && \
         printf '{\"files\":{\"scripts/sct_maths.py\":[3]}}' > .coverage.w2",
    );

    let outcome = Pipeline::run(&plan).await;
    assert!(outcome.success);

    let db = CoverageDatabase::load(&plan.coverage.data_file).unwrap();
    assert_eq!(db.covered_lines("scripts/sct_maths.py"), 3);
    assert!(!fixture.workdir().join(".coverage.w1").exists());
    assert!(!fixture.workdir().join(".coverage.w2").exists());
}

#[tokio::test]
async fn missing_tool_aborts_before_the_test_stage() {
    // Catalogue asks for a tool the stub install does not provide.
    let fixture = Fixture::new(&[]);
    let mut plan = fixture.plan();
    let marker = fixture.workdir().join("suite-ran");
    plan.test_command = sh(format!("touch {}", marker.display()));

    let outcome = Pipeline::run(&plan).await;

    assert!(!outcome.success);
    assert_ne!(outcome.exit_code(), 0);
    assert_eq!(outcome.stages.len(), 2, "verify failure stops the run");
    assert_eq!(outcome.stages[1].stage_name, "verify");
    assert!(!outcome.stages[1].passed);
    assert!(!marker.exists(), "test stage must never have been invoked");
}

#[tokio::test]
async fn installer_failure_is_fatal_with_its_own_status() {
    let fixture = Fixture::new(&["sct_version"]);
    let mut plan = fixture.plan();
    plan.install.installer = sh("exit 3");

    let outcome = Pipeline::run(&plan).await;

    assert!(!outcome.success);
    assert_eq!(outcome.stages.len(), 1);
    assert_eq!(outcome.exit_code(), 3);
}

#[tokio::test]
async fn failing_suite_is_fatal_and_lint_never_runs() {
    let fixture = Fixture::new(&["sct_version"]);
    let mut plan = fixture.plan();
    plan.test_command = sh("exit 1");
    let marker = fixture.workdir().join("lint-ran");
    plan.lint.lint_command = sh(format!("touch {}", marker.display()));

    let outcome = Pipeline::run(&plan).await;

    assert!(!outcome.success);
    let last = outcome.stages.last().unwrap();
    assert_eq!(last.stage_name, "test");
    assert!(!last.passed);
    assert!(!marker.exists(), "lint gate must never have been invoked");
}

#[tokio::test]
async fn lint_findings_fail_the_run_with_the_masked_code() {
    let fixture = Fixture::new(&["sct_version"]);
    let mut plan = fixture.plan();
    plan.lint.lint_command = sh("exit 2");

    let outcome = Pipeline::run(&plan).await;

    assert!(!outcome.success);
    assert_eq!(outcome.stages.len(), 5);
    assert_eq!(outcome.exit_code(), 2);
}

#[tokio::test]
async fn benign_lint_status_bits_do_not_fail_the_run() {
    let fixture = Fixture::new(&["sct_version"]);
    let mut plan = fixture.plan();
    plan.lint.lint_command = sh("exit 32");

    let outcome = Pipeline::run(&plan).await;

    assert!(outcome.success, "usage bit alone is not a lint finding");
    assert_eq!(outcome.exit_code(), 0);
}
