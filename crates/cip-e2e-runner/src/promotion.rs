//! Running a real (non dry-run) promotion.

use std::io::Write;
use std::path::Path;

use cip_e2e_core::{HarnessError, Manifest, Result};
use tempfile::NamedTempFile;
use tracing::info;

use crate::command::{CommandExecutor, ExternalCommand};
use crate::config::HarnessConfig;

/// Verbosity passed to the promoter.
pub const PROMOTER_VERBOSITY: u8 = 3;

/// The promoter invocation for the manifest stored at `manifest_path`.
pub fn promotion_command(config: &HarnessConfig, manifest_path: &Path) -> ExternalCommand {
    ExternalCommand::new(&config.tools.bazel)
        .args([
            "run".to_string(),
            config.repo_status_command(),
            ":cip".to_string(),
            "--".to_string(),
            "-dry-run=false".to_string(),
            format!("-verbosity={PROMOTER_VERBOSITY}"),
            format!("-manifest={}", manifest_path.display()),
        ])
        .current_dir(&config.repo_root)
}

/// Serialize `manifest` to a transient file.
///
/// The file is removed when the returned guard drops.
pub fn write_temp_manifest(manifest: &Manifest) -> Result<NamedTempFile> {
    let yaml = manifest.to_yaml()?;
    let mut file = tempfile::Builder::new()
        .prefix("tmp-promoter-manifest")
        .suffix(".yaml")
        .tempfile()?;
    file.write_all(yaml.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Promote `manifest` for real.
pub async fn run_promotion(
    executor: &dyn CommandExecutor,
    config: &HarnessConfig,
    manifest: &Manifest,
) -> Result<()> {
    let manifest_file = write_temp_manifest(manifest)?;
    let cmd = promotion_command(config, manifest_file.path());

    let result = executor.run(&cmd).await;
    drop(manifest_file);

    let output = result.map_err(|source| HarnessError::Promotion { source })?;
    info!(stdout = %output.stdout.trim_end(), "promotion finished");
    Ok(())
}
