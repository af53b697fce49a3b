//! Recursive registry inventory through `gcloud container images`.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::debug;

use cip_e2e_core::{Digest, HarnessError, ImageName, RegistryContext, RegistryName, Result};

use crate::command::{CommandExecutor, ExternalCommand};
use crate::config::ToolPaths;

/// Media types of manifests that reference other manifests.
const MANIFEST_LIST_TYPES: [&str; 2] = [
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.oci.image.index.v1+json",
];

/// One `(image, digest)` pair found in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub image: ImageName,
    pub digest: Digest,

    /// As reported by `list-tags`; absent in older gcloud output.
    pub media_type: Option<String>,
}

impl InventoryEntry {
    pub fn new(image: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            image: ImageName::new(image),
            digest: Digest::new(digest),
            media_type: None,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Whether this digest is a manifest list (or OCI index). The registry
    /// refuses to delete a manifest while a list still references it.
    pub fn is_manifest_list(&self) -> bool {
        self.media_type
            .as_deref()
            .is_some_and(|t| MANIFEST_LIST_TYPES.contains(&t))
    }
}

/// Everything found in one registry, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInventory {
    pub registry: RegistryName,
    pub entries: Vec<InventoryEntry>,
}

impl RegistryInventory {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ListedRepository {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListedDigest {
    digest: String,

    #[serde(default, rename = "mediaType")]
    media_type: Option<String>,
}

/// A gcloud invocation that runs as the registry's service account, if any.
pub(crate) fn gcloud_for(tools: &ToolPaths, ctx: &RegistryContext) -> ExternalCommand {
    let cmd = ExternalCommand::new(&tools.gcloud);
    match ctx.service_account.as_deref().filter(|sa| !sa.is_empty()) {
        Some(account) => cmd.arg(format!("--account={account}")),
        None => cmd,
    }
}

/// Read every image and digest under `ctx`, descending into all nested
/// repositories.
pub async fn read_registry(
    executor: &dyn CommandExecutor,
    tools: &ToolPaths,
    ctx: &RegistryContext,
) -> Result<RegistryInventory> {
    let mut entries = Vec::new();
    let mut pending = VecDeque::from([ctx.name.as_str().to_string()]);
    let prefix = format!("{}/", ctx.name);

    while let Some(repository) = pending.pop_front() {
        let list = gcloud_for(tools, ctx).args([
            "container".to_string(),
            "images".to_string(),
            "list".to_string(),
            format!("--repository={repository}"),
            "--format=json".to_string(),
        ]);
        let children: Vec<ListedRepository> = run_json(executor, &list, &ctx.name).await?;

        for child in children {
            let tags = gcloud_for(tools, ctx).args([
                "container",
                "images",
                "list-tags",
                child.name.as_str(),
                "--format=json",
            ]);
            let digests: Vec<ListedDigest> = run_json(executor, &tags, &ctx.name).await?;

            let image = child
                .name
                .strip_prefix(&prefix)
                .unwrap_or(&child.name)
                .to_string();
            debug!(registry = %ctx.name, image = %image, digests = digests.len(), "read image");
            entries.extend(digests.into_iter().map(|d| InventoryEntry {
                image: ImageName::new(image.clone()),
                digest: Digest::new(d.digest),
                media_type: d.media_type,
            }));

            pending.push_back(child.name);
        }
    }

    Ok(RegistryInventory {
        registry: ctx.name.clone(),
        entries,
    })
}

async fn run_json<T>(
    executor: &dyn CommandExecutor,
    cmd: &ExternalCommand,
    registry: &RegistryName,
) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let output = executor
        .run(cmd)
        .await
        .map_err(|source| HarnessError::SetupCommand {
            step: format!("reading registry {registry}"),
            source,
        })?;

    if output.stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&output.stdout).map_err(|e| {
        HarnessError::Setup(format!(
            "unreadable inventory output from `{}`: {e}",
            cmd.command_line()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedExecutor;

    #[tokio::test]
    async fn test_read_descends_into_nested_repositories() {
        let exec = ScriptedExecutor::new();
        exec.succeed(
            "gcloud container images list --repository=gcr.io/stage ",
            r#"[{"name": "gcr.io/stage/foo"}]"#,
        );
        exec.succeed(
            "gcloud container images list --repository=gcr.io/stage/foo ",
            r#"[{"name": "gcr.io/stage/foo/bar"}]"#,
        );
        exec.succeed(
            "gcloud container images list-tags gcr.io/stage/foo ",
            r#"[{"digest": "sha256:aaa", "tags": ["1.0"], "timestamp": {"year": 2019}}]"#,
        );
        exec.succeed(
            "gcloud container images list-tags gcr.io/stage/foo/bar ",
            r#"[{"digest": "sha256:bbb", "tags": []}, {"digest": "sha256:ccc", "tags": ["x"], "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json"}]"#,
        );

        let inventory = read_registry(&exec, &ToolPaths::default(), &RegistryContext::new("gcr.io/stage"))
            .await
            .unwrap();

        let pairs: Vec<(&str, &str)> = inventory
            .entries
            .iter()
            .map(|e| (e.image.as_str(), e.digest.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("foo", "sha256:aaa"),
                ("foo/bar", "sha256:bbb"),
                ("foo/bar", "sha256:ccc"),
            ]
        );
        assert!(!inventory.entries[1].is_manifest_list());
        assert!(inventory.entries[2].is_manifest_list());
    }

    #[test]
    fn test_oci_index_counts_as_manifest_list() {
        let entry = InventoryEntry::new("golden", "sha256:aaa");
        assert!(!entry.is_manifest_list());
        assert!(entry
            .with_media_type("application/vnd.oci.image.index.v1+json")
            .is_manifest_list());
        assert!(!InventoryEntry::new("golden", "sha256:bbb")
            .with_media_type("application/vnd.docker.distribution.manifest.v2+json")
            .is_manifest_list());
    }

    #[tokio::test]
    async fn test_service_account_passed_to_gcloud() {
        let exec = ScriptedExecutor::new();
        let ctx = RegistryContext::new("gcr.io/stage").with_service_account("sa@p.iam.gserviceaccount.com");

        let inventory = read_registry(&exec, &ToolPaths::default(), &ctx).await.unwrap();
        assert!(inventory.is_empty());
        assert_eq!(
            exec.command_lines(),
            vec!["gcloud --account=sa@p.iam.gserviceaccount.com container images list --repository=gcr.io/stage --format=json"]
        );
    }

    #[tokio::test]
    async fn test_garbled_listing_is_setup_error() {
        let exec = ScriptedExecutor::new();
        exec.succeed("gcloud container images list ", "not json");
        let err = read_registry(&exec, &ToolPaths::default(), &RegistryContext::new("gcr.io/stage"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "setup");
    }
}
