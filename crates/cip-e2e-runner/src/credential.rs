//! Service account activation.

use std::path::Path;

use cip_e2e_core::{HarnessError, Result};
use tracing::info;

use crate::command::{CommandExecutor, ExternalCommand};
use crate::config::ToolPaths;

/// Activate the service account in `key_file` for every later gcloud call.
///
/// Runs once, before any test case. The suite only supports one activated
/// account.
pub async fn activate_service_account(
    executor: &dyn CommandExecutor,
    tools: &ToolPaths,
    key_file: &Path,
) -> Result<()> {
    let cmd = ExternalCommand::new(&tools.gcloud).args([
        "auth".to_string(),
        "activate-service-account".to_string(),
        format!("--key-file={}", key_file.display()),
    ]);

    let output = executor
        .run(&cmd)
        .await
        .map_err(|source| HarnessError::Auth {
            key_file: key_file.to_path_buf(),
            source,
        })?;

    info!(key_file = %key_file.display(), stdout = %output.stdout.trim(), "activated service account");
    Ok(())
}
