//! Inventory acquisition
//!
//! Inventories come either from a JSON file or from the `instances` output of a
//! Terraform workspace.

use super::Inventory;
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Time allowed for `terraform output` to answer
pub const TERRAFORM_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the inventory comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventorySource {
    /// JSON file in inventory format
    File(PathBuf),
    /// Terraform working directory exposing an `instances` output
    Terraform(PathBuf),
}

impl InventorySource {
    /// Load the inventory from this source
    pub async fn load(&self) -> Result<Inventory> {
        match self {
            InventorySource::File(path) => load_file(path),
            InventorySource::Terraform(dir) => fetch_terraform(dir).await,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InventorySource::File(path) => format!("file {}", path.display()),
            InventorySource::Terraform(dir) => format!("Terraform ({})", dir.display()),
        }
    }
}

/// Load an inventory JSON file
pub fn load_file(path: &Path) -> Result<Inventory> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory file: {}", path.display()))?;

    Inventory::from_json_str(&contents)
        .with_context(|| format!("Invalid inventory file: {}", path.display()))
}

/// Fetch the inventory from `terraform output -json instances`
pub async fn fetch_terraform(dir: &Path) -> Result<Inventory> {
    let mut cmd = Command::new("terraform");
    cmd.arg(format!("-chdir={}", dir.display()))
        .args(["output", "-json", "instances"])
        .kill_on_drop(true);

    let output = tokio::time::timeout(TERRAFORM_TIMEOUT, cmd.output())
        .await
        .with_context(|| {
            format!(
                "terraform output did not finish within {}s",
                TERRAFORM_TIMEOUT.as_secs()
            )
        })?
        .context("Failed to run terraform (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "terraform output failed ({}): {}",
            output.status,
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Inventory::from_json_str(&stdout).context(
        "No usable instances in Terraform output. Run 'terraform apply' first.",
    )
}
