//! Read-only registry snapshots taken through the promoter's snapshot mode.

use cip_e2e_core::{HarnessError, ImageRecord, Manifest, RegistryName, Result};
use tracing::debug;

use crate::command::{CommandExecutor, ExternalCommand};
use crate::config::HarnessConfig;

/// The promoter invocation that prints a snapshot of `registry`.
pub fn snapshot_command(config: &HarnessConfig, registry: &RegistryName, manifest: &Manifest) -> ExternalCommand {
    let mut cmd = ExternalCommand::new(&config.tools.bazel)
        .args([
            "run".to_string(),
            config.repo_status_command(),
            ":cip".to_string(),
            "--".to_string(),
            format!("-snapshot={registry}"),
        ])
        .current_dir(&config.repo_root);

    if let Some(account) = manifest.service_account_for(registry) {
        cmd = cmd.arg(format!("-snapshot-service-account={account}"));
    }
    cmd
}

/// Parse snapshot output strictly. Blank output means an empty registry.
pub fn parse_snapshot(registry: &RegistryName, stdout: &str) -> Result<Vec<ImageRecord>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(stdout).map_err(|e| HarnessError::Parse {
        origin: format!("snapshot of {registry}"),
        message: e.to_string(),
    })
}

/// Capture the current contents of `registry`.
pub async fn capture_snapshot(
    executor: &dyn CommandExecutor,
    config: &HarnessConfig,
    registry: &RegistryName,
    manifest: &Manifest,
) -> Result<Vec<ImageRecord>> {
    let cmd = snapshot_command(config, registry, manifest);
    let output = executor
        .run(&cmd)
        .await
        .map_err(|source| HarnessError::Snapshot {
            registry: registry.clone(),
            source,
        })?;

    let images = parse_snapshot(registry, &output.stdout)?;
    debug!(registry = %registry, images = images.len(), "captured snapshot");
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedExecutor;
    use cip_e2e_core::RegistryContext;

    fn manifest() -> Manifest {
        Manifest {
            registries: vec![
                RegistryContext::new("gcr.io/stage").with_service_account("sa@x").source(),
                RegistryContext::new("us.gcr.io/prod"),
            ],
            ..Manifest::default()
        }
    }

    #[test]
    fn test_snapshot_command_with_service_account() {
        let config = HarnessConfig::new("/repo", "/work");
        let cmd = snapshot_command(&config, &RegistryName::from("gcr.io/stage"), &manifest());
        assert_eq!(
            cmd.command_line(),
            "bazel run --workspace_status_command=/repo/workspace_status.sh :cip -- -snapshot=gcr.io/stage -snapshot-service-account=sa@x"
        );
        assert_eq!(cmd.cwd.as_deref(), Some(std::path::Path::new("/repo")));
    }

    #[test]
    fn test_snapshot_command_without_service_account() {
        let config = HarnessConfig::new("/repo", "/work");
        let cmd = snapshot_command(&config, &RegistryName::from("us.gcr.io/prod"), &manifest());
        assert!(cmd.command_line().ends_with("-snapshot=us.gcr.io/prod"));
    }

    #[test]
    fn test_parse_snapshot_output() {
        let out = "- name: foo\n  dmap:\n    \"sha256:aaa\":\n    - \"1.0\"\n";
        let images = parse_snapshot(&RegistryName::from("prod"), out).unwrap();
        assert_eq!(images, vec![ImageRecord::new("foo").with_digest("sha256:aaa", ["1.0"])]);

        assert!(parse_snapshot(&RegistryName::from("prod"), "[]\n").unwrap().is_empty());
        assert!(parse_snapshot(&RegistryName::from("prod"), "").unwrap().is_empty());
    }

    #[test]
    fn test_parse_snapshot_is_strict() {
        let out = "- name: foo\n  size: 12\n";
        let err = parse_snapshot(&RegistryName::from("prod"), out).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn test_capture_failure_is_snapshot_error() {
        let exec = ScriptedExecutor::new();
        exec.fail("bazel run", "build failed");
        let config = HarnessConfig::new("/repo", "/work");

        let err = capture_snapshot(&exec, &config, &RegistryName::from("us.gcr.io/prod"), &manifest())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "snapshot");
    }
}
