//! Harness configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Names (or paths) of the external tools the harness drives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolPaths {
    /// Build/execution CLI; also runs the promoter binary.
    pub bazel: String,

    /// Manifest-list CLI.
    pub docker: String,

    /// Authentication and registry CLI.
    pub gcloud: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            bazel: "bazel".to_string(),
            docker: "docker".to_string(),
            gcloud: "gcloud".to_string(),
        }
    }
}

/// Everything the runner needs to know about its surroundings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Promoter repository checkout; working directory for build and
    /// registry tooling.
    pub repo_root: PathBuf,

    /// Directory holding the `workspace_status.sh` used for golden image
    /// builds (normally `$PWD`).
    pub pwd: PathBuf,

    pub tools: ToolPaths,

    /// Per-command time limit; `None` waits forever.
    pub command_timeout: Option<Duration>,
}

impl HarnessConfig {
    pub fn new(repo_root: impl Into<PathBuf>, pwd: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            pwd: pwd.into(),
            tools: ToolPaths::default(),
            command_timeout: None,
        }
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    /// Seconds to wait per command; 0 disables the limit.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.command_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// `--workspace_status_command` value for promoter invocations.
    pub fn repo_status_command(&self) -> String {
        status_command_flag(&self.repo_root)
    }

    /// `--workspace_status_command` value for golden image builds.
    pub fn pwd_status_command(&self) -> String {
        status_command_flag(&self.pwd)
    }

    /// Path of the workspace status script next to `pwd`.
    pub fn status_script(&self) -> PathBuf {
        self.pwd.join(STATUS_SCRIPT)
    }
}

const STATUS_SCRIPT: &str = "workspace_status.sh";

fn status_command_flag(dir: &Path) -> String {
    format!(
        "--workspace_status_command={}",
        dir.join(STATUS_SCRIPT).display()
    )
}
