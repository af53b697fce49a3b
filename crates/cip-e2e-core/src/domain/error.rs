//! Error taxonomy for the e2e harness.
//!
//! Nothing here is recoverable: every variant aborts the suite run. The
//! variants exist so the operator can tell which kind of step broke.

use std::path::PathBuf;

use crate::domain::image::RegistryName;
use crate::verify::SnapshotMismatch;

/// Failure of a single external program invocation.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },
}

impl CommandError {
    /// The rendered command line that failed.
    pub fn command(&self) -> &str {
        match self {
            CommandError::Spawn { command, .. }
            | CommandError::Failed { command, .. }
            | CommandError::TimedOut { command, .. } => command,
        }
    }

    /// Captured standard output, empty when the process never completed.
    pub fn stdout(&self) -> &str {
        match self {
            CommandError::Failed { stdout, .. } => stdout,
            _ => "",
        }
    }

    /// Captured standard error, empty when the process never completed.
    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Failed { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// Harness errors.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not activate service account from {}: {source}", key_file.display())]
    Auth {
        key_file: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("test setup failed while {step}: {source}")]
    SetupCommand {
        step: String,
        #[source]
        source: CommandError,
    },

    #[error("test setup failed: {0}")]
    Setup(String),

    #[error("parse error in {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("could not get snapshot of registry {registry}: {source}")]
    Snapshot {
        registry: RegistryName,
        #[source]
        source: CommandError,
    },

    #[error("error with promotion: {source}")]
    Promotion {
        #[source]
        source: CommandError,
    },

    #[error(transparent)]
    Mismatch(#[from] SnapshotMismatch),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Short, stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Config(_) => "config",
            HarnessError::Auth { .. } => "auth",
            HarnessError::SetupCommand { .. } | HarnessError::Setup(_) => "setup",
            HarnessError::Parse { .. } => "parse",
            HarnessError::Snapshot { .. } => "snapshot",
            HarnessError::Promotion { .. } => "promotion",
            HarnessError::Mismatch(_) => "mismatch",
            HarnessError::Io(_) => "io",
        }
    }

    /// The underlying command failure, when there is one.
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            HarnessError::Auth { source, .. }
            | HarnessError::SetupCommand { source, .. }
            | HarnessError::Snapshot { source, .. }
            | HarnessError::Promotion { source } => Some(source),
            _ => None,
        }
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
