//! Environment bootstrap: installer invocation and the explicit
//! environment configuration handed to every later stage.
//!
//! The installer mutates nothing in this process. It is run as a child,
//! and the profile it writes is parsed into an immutable [`EnvConfig`]
//! that stages receive by reference. Search-path resolution and child
//! process environment setup both go through that value.

use crate::error::{PipelineError, Result};
use crate::runner;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Installer invocation and the artifacts it is expected to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Installer argv, non-interactive flags included (e.g. `./install_sct -y`).
    pub installer: Vec<String>,

    /// Environment profile the installer writes on success.
    pub profile: PathBuf,

    /// Name of the isolated runtime environment to activate.
    pub env_name: String,
}

/// Explicit environment for one pipeline run.
///
/// Produced once by [`Bootstrapper::run`] and then only read. Entries in
/// `path_entries` take precedence over the inherited `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Working directory for every spawned command.
    pub workdir: PathBuf,

    /// Search-path entries prepended to the inherited `PATH`, in order.
    pub path_entries: Vec<PathBuf>,

    /// Extra environment variables for spawned commands.
    pub vars: BTreeMap<String, String>,
}

impl EnvConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            path_entries: Vec::new(),
            vars: BTreeMap::new(),
        }
    }

    /// Copy of this configuration with extra variables set.
    pub fn with_vars(&self, extra: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut env = self.clone();
        env.vars.extend(extra);
        env
    }

    /// Full search path: configured entries first, inherited `PATH` after.
    pub fn search_path(&self) -> OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut dirs = self.path_entries.clone();
        dirs.extend(std::env::split_paths(&inherited));
        std::env::join_paths(dirs).unwrap_or(inherited)
    }

    /// Resolve a command name to an executable file on the search path.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        for dir in std::env::split_paths(&self.search_path()) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Apply working directory, search path and variables to a command.
    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        cmd.current_dir(&self.workdir);
        cmd.env("PATH", self.search_path());
        for (key, value) in &self.vars {
            cmd.env(key, value);
        }
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Runs the installer and turns its environment profile into an [`EnvConfig`].
pub struct Bootstrapper;

impl Bootstrapper {
    /// Install the distribution and load the resulting environment.
    ///
    /// The installer runs with `PIP_PROGRESS_BAR=off` so dependency
    /// installation produces no interactive progress indicator. A non-zero
    /// installer exit aborts the run with [`PipelineError::InstallFailed`].
    pub async fn run(spec: &InstallSpec, workdir: &Path) -> Result<EnvConfig> {
        let mut install_env = EnvConfig::new(workdir);
        install_env
            .vars
            .insert("PIP_PROGRESS_BAR".to_string(), "off".to_string());

        info!(command = %spec.installer.join(" "), "running installer");
        let exec = runner::run_command(&spec.installer, &install_env).await?;
        if !exec.success {
            error!(status = exec.exit_code, "installer failed");
            debug!(stdout = %exec.stdout, stderr = %exec.stderr, "installer output");
            return Err(PipelineError::InstallFailed {
                status: exec.exit_code,
            });
        }

        if !spec.profile.is_file() {
            return Err(PipelineError::ProfileNotFound(spec.profile.clone()));
        }
        let text = std::fs::read_to_string(&spec.profile)?;

        let mut env = EnvConfig::new(workdir);
        parse_profile(&text, &mut env);
        activate(&mut env, &spec.env_name);

        info!(
            profile = %spec.profile.display(),
            path_entries = env.path_entries.len(),
            vars = env.vars.len(),
            "environment loaded"
        );
        Ok(env)
    }
}

/// Parse a shell-style environment profile.
///
/// Recognizes `export KEY=VALUE` and plain `KEY=VALUE` lines; `PATH`
/// assignments contribute their non-`$PATH` components as search-path
/// entries. Anything else (comments, blank lines, shell logic) is ignored.
fn parse_profile(text: &str, env: &mut EnvConfig) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = expand(value.trim().trim_matches('"').trim_matches('\''), &env.vars);
        if key == "PATH" {
            for part in value.split(':') {
                if part.is_empty() || part == "$PATH" || part == "${PATH}" {
                    continue;
                }
                env.path_entries.push(PathBuf::from(part));
            }
        } else {
            env.vars.insert(key.to_string(), value);
        }
    }
}

/// Substitute `$KEY` / `${KEY}` references to already-parsed variables.
fn expand(value: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = value.to_string();
    for (key, val) in vars {
        out = out.replace(&format!("${{{key}}}"), val);
        out = out.replace(&format!("${key}"), val);
    }
    out
}

/// Activate the named runtime environment by prepending its bin directory.
fn activate(env: &mut EnvConfig, name: &str) {
    match env.vars.get("SCT_DIR").map(PathBuf::from) {
        Some(root) => {
            let bin = root.join("python").join("envs").join(name).join("bin");
            env.path_entries.insert(0, bin);
            env.vars
                .insert("CONDA_DEFAULT_ENV".to_string(), name.to_string());
        }
        None => {
            warn!(env = name, "profile did not define SCT_DIR; skipping environment activation");
        }
    }
}
