//! In-memory command executor (testing only).
//!
//! `ScriptedExecutor` answers commands from canned outcomes instead of
//! spawning processes, and records every command it was asked to run.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use cip_e2e_core::CommandError;

use crate::command::{CommandExecutor, CommandOutput, ExternalCommand};

#[derive(Debug, Clone)]
enum Outcome {
    Succeed(CommandOutput),
    Fail { stdout: String, stderr: String },
}

#[derive(Debug)]
struct Rule {
    prefix: String,
    outcomes: VecDeque<Outcome>,
}

/// Executor that replays scripted outcomes.
///
/// Rules match on the rendered command line by prefix, first registered rule
/// first. A rule with several queued outcomes hands them out in order and
/// keeps repeating the last one. Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<ExternalCommand>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful outcome with `stdout` for commands starting with `prefix`.
    pub fn succeed(&self, prefix: &str, stdout: &str) -> &Self {
        self.push(prefix, Outcome::Succeed(CommandOutput::from_stdout(stdout)));
        self
    }

    /// Queue a non-zero exit for commands starting with `prefix`.
    pub fn fail(&self, prefix: &str, stderr: &str) -> &Self {
        self.push(
            prefix,
            Outcome::Fail {
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    fn push(&self, prefix: &str, outcome: Outcome) {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|r| r.prefix == prefix) {
            Some(rule) => rule.outcomes.push_back(outcome),
            None => rules.push(Rule {
                prefix: prefix.to_string(),
                outcomes: VecDeque::from([outcome]),
            }),
        }
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<ExternalCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines run so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ExternalCommand::command_line).collect()
    }

    /// Number of commands run whose line starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, cmd: &ExternalCommand) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(cmd.clone());
        let line = cmd.command_line();

        let outcome = {
            let mut rules = self.rules.lock().unwrap();
            rules
                .iter_mut()
                .find(|r| line.starts_with(&r.prefix))
                .and_then(|rule| {
                    if rule.outcomes.len() > 1 {
                        rule.outcomes.pop_front()
                    } else {
                        rule.outcomes.front().cloned()
                    }
                })
        };

        match outcome {
            Some(Outcome::Succeed(output)) => Ok(output),
            Some(Outcome::Fail { stdout, stderr }) => Err(CommandError::Failed {
                command: line,
                status: "exit status: 1".to_string(),
                stdout,
                stderr,
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_outcomes_then_sticky_last() {
        let exec = ScriptedExecutor::new();
        exec.succeed("bazel run", "first").succeed("bazel run", "second");

        let cmd = ExternalCommand::new("bazel").args(["run", ":cip"]);
        assert_eq!(exec.run(&cmd).await.unwrap().stdout, "first");
        assert_eq!(exec.run(&cmd).await.unwrap().stdout, "second");
        assert_eq!(exec.run(&cmd).await.unwrap().stdout, "second");
        assert_eq!(exec.count("bazel run"), 3);
    }

    #[tokio::test]
    async fn test_unmatched_command_succeeds_empty() {
        let exec = ScriptedExecutor::new();
        exec.fail("gcloud auth", "nope");

        let out = exec.run(&ExternalCommand::new("docker")).await.unwrap();
        assert_eq!(out, CommandOutput::default());

        let err = exec
            .run(&ExternalCommand::new("gcloud").args(["auth", "login"]))
            .await
            .unwrap_err();
        assert_eq!(err.stderr(), "nope");
    }
}
