//! Error types for pipeline operations

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("installer exited with status {status}")]
    InstallFailed { status: i32 },

    #[error("environment profile not found at {0}")]
    ProfileNotFound(PathBuf),

    #[error("required tool not found on search path: {name}")]
    MissingTool { name: String },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Exit code this error contributes to the overall run status.
    ///
    /// Installer failures carry the installer's own status through;
    /// everything else maps to a plain failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::InstallFailed { status } => *status,
            _ => 1,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_failure_keeps_installer_status() {
        let err = PipelineError::InstallFailed { status: 17 };
        assert_eq!(err.exit_code(), 17);
    }

    #[test]
    fn missing_tool_maps_to_plain_failure() {
        let err = PipelineError::MissingTool {
            name: "sct_version".to_string(),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("sct_version"));
    }
}
