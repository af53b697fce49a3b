//! Publishing the golden multi-architecture test image.
//!
//! Test manifests promote a fixed image, so it has to exist in the staging
//! registry before every test. The sequence is: build the image tarball,
//! push the per-platform images, assemble a manifest list from them, fix the
//! architecture of every non-default platform (the build cannot set it),
//! inspect the list, then push it with `--purge` so no stale local list
//! survives.

use serde::{Deserialize, Serialize};
use tracing::info;

use cip_e2e_core::{HarnessError, Result};

use crate::command::{CommandExecutor, ExternalCommand};
use crate::config::HarnessConfig;
use crate::workspace_status::WorkspaceStatus;

/// Status key naming the repository the golden image is pushed to.
pub const PUSH_REPOSITORY_KEY: &str = "STABLE_TEST_STAGING_IMG_REPOSITORY";

/// Architecture the build stamps on every image.
const BUILD_DEFAULT_ARCH: &str = "amd64";

/// An OS/architecture pair the golden image is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Tag suffix used for the per-platform image, e.g. `linux_s390x`.
    pub fn suffix(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

/// The golden image and the build targets that produce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenImage {
    pub name: String,
    pub tag: String,
    pub platforms: Vec<Platform>,
    pub build_target: String,
    pub push_target: String,
}

impl Default for GoldenImage {
    fn default() -> Self {
        Self {
            name: "golden".to_string(),
            tag: "1.0".to_string(),
            platforms: vec![Platform::new("linux", "amd64"), Platform::new("linux", "s390x")],
            build_target: "//test-e2e:golden-images-loadable.tar".to_string(),
            push_target: "//test-e2e:push-golden".to_string(),
        }
    }
}

impl GoldenImage {
    /// Reference of the manifest list, e.g. `gcr.io/x/golden:1.0`.
    pub fn list_ref(&self, repository: &str) -> String {
        format!("{}/{}:{}", repository, self.name, self.tag)
    }

    /// Reference of one platform image, e.g. `gcr.io/x/golden:1.0-linux_amd64`.
    pub fn platform_ref(&self, repository: &str, platform: &Platform) -> String {
        format!("{}-{}", self.list_ref(repository), platform.suffix())
    }

    /// The full publish sequence, in execution order.
    pub fn publish_commands(&self, config: &HarnessConfig, repository: &str) -> Vec<ExternalCommand> {
        let bazel = |verb: &str, target: &str| {
            ExternalCommand::new(&config.tools.bazel)
                .args([
                    verb.to_string(),
                    "--host_force_python=PY2".to_string(),
                    config.pwd_status_command(),
                    target.to_string(),
                ])
                .current_dir(&config.repo_root)
        };
        let docker = |args: Vec<String>| {
            ExternalCommand::new(&config.tools.docker)
                .arg("manifest")
                .args(args)
                .current_dir(&config.repo_root)
        };
        let list = self.list_ref(repository);

        let mut commands = vec![
            bazel("build", &self.build_target),
            // A manifest list can only reference images already in a repository.
            bazel("run", &self.push_target),
        ];

        let mut create = vec!["create".to_string(), list.clone()];
        create.extend(self.platforms.iter().map(|p| self.platform_ref(repository, p)));
        commands.push(docker(create));

        for platform in self.platforms.iter().filter(|p| p.arch != BUILD_DEFAULT_ARCH) {
            commands.push(docker(vec![
                "annotate".to_string(),
                format!("--arch={}", platform.arch),
                list.clone(),
                self.platform_ref(repository, platform),
            ]));
        }

        commands.push(docker(vec!["inspect".to_string(), list.clone()]));
        commands.push(docker(vec!["push".to_string(), "--purge".to_string(), list]));
        commands
    }
}

/// Resolve the push repository and run the publish sequence. Any failing
/// step aborts.
pub async fn publish_golden_image(
    executor: &dyn CommandExecutor,
    config: &HarnessConfig,
    golden: &GoldenImage,
) -> Result<()> {
    let status = WorkspaceStatus::load(executor, config).await?;
    let repository = status.require(PUSH_REPOSITORY_KEY)?;

    for cmd in golden.publish_commands(config, repository) {
        info!(command = %cmd, "execing cmd");
        executor
            .run(&cmd)
            .await
            .map_err(|source| HarnessError::SetupCommand {
                step: format!("publishing golden image ({})", cmd.command_line()),
                source,
            })?;
    }

    info!(image = %golden.list_ref(repository), "golden image published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedExecutor;

    fn config() -> HarnessConfig {
        HarnessConfig::new("/repo", "/work")
    }

    #[test]
    fn test_publish_sequence() {
        let lines: Vec<String> = GoldenImage::default()
            .publish_commands(&config(), "gcr.io/stage")
            .iter()
            .map(ExternalCommand::command_line)
            .collect();

        assert_eq!(
            lines,
            vec![
                "bazel build --host_force_python=PY2 --workspace_status_command=/work/workspace_status.sh //test-e2e:golden-images-loadable.tar",
                "bazel run --host_force_python=PY2 --workspace_status_command=/work/workspace_status.sh //test-e2e:push-golden",
                "docker manifest create gcr.io/stage/golden:1.0 gcr.io/stage/golden:1.0-linux_amd64 gcr.io/stage/golden:1.0-linux_s390x",
                "docker manifest annotate --arch=s390x gcr.io/stage/golden:1.0 gcr.io/stage/golden:1.0-linux_s390x",
                "docker manifest inspect gcr.io/stage/golden:1.0",
                "docker manifest push --purge gcr.io/stage/golden:1.0",
            ]
        );
    }

    #[test]
    fn test_commands_run_in_repo_root() {
        let commands = GoldenImage::default().publish_commands(&config(), "gcr.io/stage");
        assert!(commands
            .iter()
            .all(|c| c.cwd.as_deref() == Some(std::path::Path::new("/repo"))));
    }

    #[tokio::test]
    async fn test_missing_push_repository_is_setup_error() {
        let exec = ScriptedExecutor::new();
        exec.succeed("/work/workspace_status.sh", "STABLE_GIT_COMMIT abc\n");

        let err = publish_golden_image(&exec, &config(), &GoldenImage::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "setup");
        assert!(err.to_string().contains(PUSH_REPOSITORY_KEY));
        assert_eq!(exec.count("bazel"), 0);
    }

    #[tokio::test]
    async fn test_failed_step_stops_sequence() {
        let exec = ScriptedExecutor::new();
        exec.succeed(
            "/work/workspace_status.sh",
            "STABLE_TEST_STAGING_IMG_REPOSITORY gcr.io/stage\n",
        );
        exec.fail("docker manifest create", "no such manifest");

        let err = publish_golden_image(&exec, &config(), &GoldenImage::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "setup");
        assert_eq!(exec.count("bazel"), 2);
        assert_eq!(exec.count("docker manifest annotate"), 0);
        assert_eq!(exec.count("docker manifest push"), 0);
    }
}
