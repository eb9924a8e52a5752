//! Child process execution with the explicit run environment applied.

use crate::env::EnvConfig;
use crate::error::{PipelineError, Result};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

/// Result of one command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Argv that was executed.
    pub command: Vec<String>,

    /// Exit code (0 = success; -1 when terminated by signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,
}

/// Execute `argv` under the given environment and wait for it to finish.
///
/// Output is captured, not streamed. There is deliberately no timeout:
/// a hung stage hangs the run. Spawn failures are reported with the
/// command name so the diagnostic identifies the missing program.
pub async fn run_command(argv: &[String], env: &EnvConfig) -> Result<ExecResult> {
    let Some((exe, args)) = argv.split_first() else {
        return Err(PipelineError::Spawn {
            command: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        });
    };

    let start = Instant::now();

    let mut cmd = Command::new(exe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    env.apply(&mut cmd);

    let child = cmd.spawn().map_err(|source| PipelineError::Spawn {
        command: exe.clone(),
        source,
    })?;

    let output = child.wait_with_output().await?;

    Ok(ExecResult {
        command: argv.to_vec(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        success: output.status.success(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn run_simple_command() {
        let env = EnvConfig::new(".");
        let result = run_command(&argv(&["echo", "hello"]), &env)
            .await
            .expect("execute failed");
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn run_failing_command() {
        let env = EnvConfig::new(".");
        let result = run_command(&argv(&["false"]), &env)
            .await
            .expect("execute failed");
        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn spawn_failure_names_the_command() {
        let env = EnvConfig::new(".");
        let err = run_command(&argv(&["/nonexistent-binary-that-does-not-exist"]), &env)
            .await
            .unwrap_err();
        match err {
            PipelineError::Spawn { command, .. } => {
                assert!(command.contains("nonexistent"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn vars_reach_the_child() {
        let env = EnvConfig::new(".").with_vars([(
            "SCT_CI_PROBE".to_string(),
            "probe-value".to_string(),
        )]);
        let result = run_command(&argv(&["sh", "-c", "echo $SCT_CI_PROBE"]), &env)
            .await
            .expect("execute failed");
        assert!(result.stdout.contains("probe-value"));
    }
}
