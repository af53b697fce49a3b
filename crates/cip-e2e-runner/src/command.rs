//! External command execution.
//!
//! Every interaction with the outside world (gcloud, bazel, docker, the
//! workspace status script) goes through [`CommandExecutor`]. Each command is
//! attempted exactly once; a non-zero exit is an error carrying both captured
//! streams.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cip_e2e_core::CommandError;
use tokio::process::Command;
use tracing::{debug, error};

/// A program invocation: program, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Space-joined command line, used in logs and errors.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Executes external commands.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `cmd` to completion.
    async fn run(&self, cmd: &ExternalCommand) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    timeout: Option<Duration>,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill and fail any command that runs longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, cmd: &ExternalCommand) -> Result<CommandOutput, CommandError> {
        let start = Instant::now();
        let command_line = cmd.command_line();
        debug!(command = %command_line, cwd = ?cmd.cwd, "execing command");

        let mut process = Command::new(&cmd.program);
        process
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cmd.cwd {
            process.current_dir(dir);
        }

        let child = process.spawn().map_err(|source| {
            error!(command = %command_line, error = %source, "command could not be spawned");
            CommandError::Spawn {
                command: command_line.clone(),
                source,
            }
        })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    error!(command = %command_line, timeout_secs = limit.as_secs(), "command timed out");
                    CommandError::TimedOut {
                        command: command_line.clone(),
                        timeout_secs: limit.as_secs(),
                    }
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| CommandError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let duration_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            error!(
                command = %command_line,
                status = %output.status,
                duration_ms = duration_ms,
                stdout = %stdout,
                stderr = %stderr,
                "command failed"
            );
            return Err(CommandError::Failed {
                command: command_line,
                status: output.status.to_string(),
                stdout,
                stderr,
            });
        }

        debug!(
            command = %command_line,
            duration_ms = duration_ms,
            stdout = %stdout,
            stderr = %stderr,
            "command succeeded"
        );
        Ok(CommandOutput { stdout, stderr })
    }
}
