//! Build-time option values from the workspace status script.
//!
//! The script prints one `KEY value` pair per line, the same format bazel's
//! `--workspace_status_command` consumes.

use std::collections::BTreeMap;

use cip_e2e_core::{HarnessError, Result};

use crate::command::{CommandExecutor, ExternalCommand};
use crate::config::HarnessConfig;

/// Parsed `KEY value` pairs. Lines that are not exactly two
/// space-separated words are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceStatus {
    values: BTreeMap<String, String>,
}

impl WorkspaceStatus {
    pub fn parse(output: &str) -> Self {
        let values = output
            .lines()
            .filter_map(|line| {
                let words: Vec<&str> = line.split(' ').collect();
                match words.as_slice() {
                    [key, value] if !key.is_empty() && !value.is_empty() => {
                        Some((key.to_string(), value.to_string()))
                    }
                    _ => None,
                }
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Run the status script found under `config.pwd` and parse its output.
    pub async fn load(executor: &dyn CommandExecutor, config: &HarnessConfig) -> Result<Self> {
        let script = config.status_script();
        let cmd = ExternalCommand::new(script.display().to_string());
        let output = executor
            .run(&cmd)
            .await
            .map_err(|source| HarnessError::SetupCommand {
                step: "reading workspace status".to_string(),
                source,
            })?;
        Ok(Self::parse(&output.stdout))
    }

    /// Like [`WorkspaceStatus::get`] but a missing key is a setup error.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| HarnessError::Setup(format!("could not dereference {key}")))
    }
}
