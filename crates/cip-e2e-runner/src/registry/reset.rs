//! Clearing registries back to an empty baseline.

use tracing::info;

use cip_e2e_core::{HarnessError, Manifest, RegistryContext, Result};

use crate::command::{CommandExecutor, ExternalCommand};
use crate::config::ToolPaths;
use crate::registry::inventory::{gcloud_for, read_registry, InventoryEntry};

/// The delete command for one digest. Tags pointing at the digest are removed
/// with it.
pub fn delete_command(tools: &ToolPaths, ctx: &RegistryContext, entry: &InventoryEntry) -> ExternalCommand {
    gcloud_for(tools, ctx).args([
        "container".to_string(),
        "images".to_string(),
        "delete".to_string(),
        format!("{}/{}@{}", ctx.name, entry.image, entry.digest),
        "--format=json".to_string(),
        "--force-delete-tags".to_string(),
        "--quiet".to_string(),
    ])
}

/// Order `entries` for deletion: manifest lists go before the manifests they
/// reference, otherwise discovery order is kept.
pub fn deletion_order(mut entries: Vec<InventoryEntry>) -> Vec<InventoryEntry> {
    entries.sort_by_key(|e| !e.is_manifest_list());
    entries
}

/// Delete every digest of every image in `ctx`. Returns how many digests were
/// deleted. The first failed delete aborts; nothing is rolled back.
pub async fn clear_registry(
    executor: &dyn CommandExecutor,
    tools: &ToolPaths,
    ctx: &RegistryContext,
) -> Result<usize> {
    let inventory = read_registry(executor, tools, ctx).await?;
    info!(registry = %ctx.name, digests = inventory.entries.len(), "clearing registry");

    let entries = deletion_order(inventory.entries);
    for entry in &entries {
        let cmd = delete_command(tools, ctx, entry);
        executor
            .run(&cmd)
            .await
            .map_err(|source| HarnessError::SetupCommand {
                step: format!("clearing registry {} ({}@{})", ctx.name, entry.image, entry.digest),
                source,
            })?;
    }

    Ok(entries.len())
}

/// Clear every registry the manifest names, in declaration order.
pub async fn clear_manifest_registries(
    executor: &dyn CommandExecutor,
    tools: &ToolPaths,
    manifest: &Manifest,
) -> Result<usize> {
    let mut deleted = 0;
    for ctx in &manifest.registries {
        deleted += clear_registry(executor, tools, ctx).await?;
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedExecutor;

    fn seeded() -> ScriptedExecutor {
        let exec = ScriptedExecutor::new();
        exec.succeed(
            "gcloud container images list --repository=gcr.io/stage ",
            r#"[{"name": "gcr.io/stage/foo"}]"#,
        );
        exec.succeed(
            "gcloud container images list-tags gcr.io/stage/foo ",
            r#"[{"digest": "sha256:aaa", "tags": ["1.0"]}, {"digest": "sha256:bbb", "tags": []}]"#,
        );
        exec
    }

    #[test]
    fn test_delete_command_shape() {
        let ctx = RegistryContext::new("gcr.io/stage").with_service_account("sa@x");
        let entry = InventoryEntry::new("foo/bar", "sha256:aaa");
        assert_eq!(
            delete_command(&ToolPaths::default(), &ctx, &entry).command_line(),
            "gcloud --account=sa@x container images delete gcr.io/stage/foo/bar@sha256:aaa --format=json --force-delete-tags --quiet"
        );
    }

    #[tokio::test]
    async fn test_clear_deletes_each_digest() {
        let exec = seeded();
        let deleted = clear_registry(&exec, &ToolPaths::default(), &RegistryContext::new("gcr.io/stage"))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(exec.count("gcloud container images delete gcr.io/stage/foo@sha256:aaa"), 1);
        assert_eq!(exec.count("gcloud container images delete gcr.io/stage/foo@sha256:bbb"), 1);
    }

    #[tokio::test]
    async fn test_manifest_lists_deleted_before_their_children() {
        let exec = ScriptedExecutor::new();
        exec.succeed(
            "gcloud container images list --repository=gcr.io/stage ",
            r#"[{"name": "gcr.io/stage/golden"}]"#,
        );
        exec.succeed(
            "gcloud container images list-tags gcr.io/stage/golden ",
            r#"[
                {"digest": "sha256:amd64", "tags": [], "mediaType": "application/vnd.docker.distribution.manifest.v2+json"},
                {"digest": "sha256:s390x", "tags": [], "mediaType": "application/vnd.docker.distribution.manifest.v2+json"},
                {"digest": "sha256:list", "tags": ["1.0"], "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json"}
            ]"#,
        );

        clear_registry(&exec, &ToolPaths::default(), &RegistryContext::new("gcr.io/stage"))
            .await
            .unwrap();

        let deleted: Vec<String> = exec
            .command_lines()
            .into_iter()
            .filter(|l| l.starts_with("gcloud container images delete"))
            .collect();
        assert_eq!(deleted.len(), 3);
        assert!(deleted[0].contains("golden@sha256:list"));
        assert!(deleted[1].contains("golden@sha256:amd64"));
        assert!(deleted[2].contains("golden@sha256:s390x"));
    }

    #[tokio::test]
    async fn test_first_failed_delete_aborts() {
        let exec = seeded();
        exec.fail("gcloud container images delete gcr.io/stage/foo@sha256:aaa", "permission denied");

        let err = clear_registry(&exec, &ToolPaths::default(), &RegistryContext::new("gcr.io/stage"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "setup");
        assert_eq!(exec.count("gcloud container images delete"), 1);
    }

    #[tokio::test]
    async fn test_clear_every_manifest_registry() {
        let exec = seeded();
        let manifest = Manifest {
            registries: vec![RegistryContext::new("gcr.io/stage"), RegistryContext::new("us.gcr.io/prod")],
            ..Manifest::default()
        };
        let deleted = clear_manifest_registries(&exec, &ToolPaths::default(), &manifest)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(exec.count("gcloud container images list --repository=us.gcr.io/prod"), 1);
    }
}
