//! Coverage instrumentation artifacts, per-worker fragments and the
//! consolidated database.
//!
//! The test stage configures the external coverage engine so that every
//! worker process measures independently and keeps its own result. After
//! the suite finishes, [`combine`] folds all fragments in the working
//! directory into one database keyed by source line. Combination is pure
//! aggregation: it reports, it never gates.

use crate::env::EnvConfig;
use crate::stage::{GateDecision, Stage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Declarative engine configuration: workers measure concurrently and
/// every per-process result is kept separate until merged.
pub const ENGINE_CONFIG: &str = "[run]\nconcurrency = multiprocessing\nparallel = True\n";

/// One-line process-startup hook; makes every spawned subprocess
/// initialize measurement.
pub const STARTUP_HOOK: &str = "import coverage; coverage.process_startup()\n";

/// On-disk locations of the instrumentation artifacts for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageLayout {
    /// Engine configuration file.
    pub rcfile: PathBuf,

    /// Consolidated database; fragments are siblings named
    /// `<data_file>.<suffix>`.
    pub data_file: PathBuf,

    /// Startup-hook file.
    pub hook_file: PathBuf,
}

impl CoverageLayout {
    pub fn in_workdir(workdir: &Path) -> Self {
        Self {
            rcfile: workdir.join(".coveragerc"),
            data_file: workdir.join(".coverage"),
            hook_file: workdir.join("coverage-startup.pth"),
        }
    }

    /// Write the engine config and the startup hook.
    pub fn write_instrumentation(&self) -> std::io::Result<()> {
        std::fs::write(&self.rcfile, ENGINE_CONFIG)?;
        std::fs::write(&self.hook_file, STARTUP_HOOK)
    }

    /// Variables directing the engine at this layout.
    pub fn engine_env(&self) -> Vec<(String, String)> {
        vec![
            (
                "COVERAGE_PROCESS_START".to_string(),
                self.rcfile.to_string_lossy().into_owned(),
            ),
            (
                "COVERAGE_FILE".to_string(),
                self.data_file.to_string_lossy().into_owned(),
            ),
        ]
    }
}

/// Per-worker record of which source lines executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageFragment {
    /// Source file path -> executed line numbers.
    pub files: BTreeMap<String, BTreeSet<u64>>,
}

impl CoverageFragment {
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Consolidated coverage report, keyed by source line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageDatabase {
    pub generated_at: DateTime<Utc>,

    /// Source file path -> union of executed line numbers.
    pub files: BTreeMap<String, BTreeSet<u64>>,
}

impl CoverageDatabase {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }

    /// Union-merge a fragment into the database. Idempotent: absorbing the
    /// same line sets again changes nothing.
    pub fn absorb(&mut self, fragment: &CoverageFragment) {
        for (file, lines) in &fragment.files {
            self.files
                .entry(file.clone())
                .or_default()
                .extend(lines.iter().copied());
        }
    }

    /// Number of covered lines in one source file.
    pub fn covered_lines(&self, file: &str) -> usize {
        self.files.get(file).map_or(0, BTreeSet::len)
    }

    /// Total covered lines across all source files.
    pub fn total_covered(&self) -> usize {
        self.files.values().map(BTreeSet::len).sum()
    }

    pub fn write(&self, path: &Path) -> crate::error::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for CoverageDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// All fragment files for this layout, `<data_file>.<suffix>`.
pub fn discover_fragments(layout: &CoverageLayout) -> std::io::Result<Vec<PathBuf>> {
    let dir = layout.data_file.parent().unwrap_or(Path::new("."));
    let stem = layout
        .data_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!("{stem}.");

    let mut fragments = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && entry.path().is_file() {
            fragments.push(entry.path());
        }
    }
    fragments.sort();
    Ok(fragments)
}

/// Merge every fragment into the consolidated database and consume them.
///
/// A worker that produced no fragment, or a corrupt fragment, degrades
/// reporting completeness only: it is logged and skipped. Test
/// correctness was already gated by the test stage.
pub fn combine(layout: &CoverageLayout) -> crate::error::Result<CoverageDatabase> {
    let fragments = discover_fragments(layout)?;
    if fragments.is_empty() {
        warn!("no coverage fragments found; report will be empty");
    }

    let mut db = CoverageDatabase::new();
    let mut consumed = Vec::new();
    for path in &fragments {
        match CoverageFragment::load(path) {
            Ok(fragment) => {
                db.absorb(&fragment);
                consumed.push(path.clone());
            }
            Err(e) => {
                warn!(fragment = %path.display(), error = %e, "skipping unreadable coverage fragment");
            }
        }
    }

    db.write(&layout.data_file)?;
    for path in consumed {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(fragment = %path.display(), error = %e, "failed to remove consumed fragment");
        }
    }

    info!(
        fragments = fragments.len(),
        files = db.files.len(),
        lines = db.total_covered(),
        report = %layout.data_file.display(),
        "coverage combined"
    );
    Ok(db)
}

/// Pipeline stage wrapping [`combine`]. Informational: always passes.
pub struct CombineStage {
    pub layout: CoverageLayout,
}

#[async_trait]
impl Stage for CombineStage {
    fn name(&self) -> &'static str {
        "combine"
    }

    async fn run(&self, _env: &EnvConfig) -> crate::error::Result<GateDecision> {
        if let Err(e) = combine(&self.layout) {
            warn!(error = %e, "coverage combination failed; report is incomplete");
        }
        Ok(GateDecision::Pass)
    }
}
