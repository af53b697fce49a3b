//! Registry reset: inventory every registry of a test, delete what it
//! holds, then republish the golden image.

pub mod inventory;
pub mod reset;

use cip_e2e_core::{Manifest, Result};
use tracing::info;

use crate::command::CommandExecutor;
use crate::config::HarnessConfig;
use crate::golden::{publish_golden_image, GoldenImage};

pub use inventory::{read_registry, InventoryEntry, RegistryInventory};
pub use reset::{clear_manifest_registries, clear_registry, delete_command, deletion_order};

/// Bring the registries of `manifest` to the known baseline: empty, except
/// for the freshly published golden image.
///
/// Clearing runs first. The golden image lives in the staging registry, so
/// publishing it before clearing would delete it again.
pub async fn reset_registries(
    executor: &dyn CommandExecutor,
    config: &HarnessConfig,
    manifest: &Manifest,
    golden: &GoldenImage,
) -> Result<()> {
    let deleted = clear_manifest_registries(executor, &config.tools, manifest).await?;
    info!(registries = manifest.registries.len(), deleted = deleted, "registries cleared");
    publish_golden_image(executor, config, golden).await
}
