//! Error types for stack-up

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("missing config file: {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed with exit code {code}: {command}")]
    CommandFailed { command: String, code: i32 },
}

impl StackError {
    /// Process exit status for this failure. A failed build/up hands back the
    /// orchestrator's own status.
    pub fn exit_code(&self) -> i32 {
        match self {
            StackError::CommandFailed { code, .. } => *code,
            _ => 1,
        }
    }
}
