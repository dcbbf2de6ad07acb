//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! Every section is optional in TOML; missing values fall back to the defaults
//! below. CLI flags override whatever the file provides.
//!
//! ```toml
//! [run]
//! ping_count = 100
//! ping_interval = 0.2
//! time_budget = "60s"
//! max_parallel = 10
//! symmetry = "full_mesh_directed"
//!
//! [ssh]
//! key = "~/.ssh/latency-mesh.pem"
//! connect_timeout = "10s"
//!
//! [ssh.users]
//! aws = "ec2-user"
//! azure = "azureuser"
//!
//! [inventory]
//! terraform_dir = "terraform"
//!
//! [output]
//! top_n = 10
//! ```

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::coordinator::RunSettings;
use crate::inventory::source::InventorySource;
use crate::mesh::SymmetryMode;
use crate::probe::ssh::{default_users, PingOptions, SshUsers};
use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Terraform directory used when neither an inventory file nor a directory is given
pub const DEFAULT_TERRAFORM_DIR: &str = "terraform";

/// Parent of the timestamped per-run output directories
pub const DEFAULT_RESULTS_ROOT: &str = "results";

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Measurement parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Ping packets per pair
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    /// Seconds between ping packets
    #[serde(default = "default_ping_interval")]
    pub ping_interval: f64,
    /// Wall-clock budget per pair (e.g. "60s", "2m")
    #[serde(default = "default_time_budget")]
    pub time_budget: String,
    /// Concurrent probes per region
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default)]
    pub symmetry: SymmetryMode,
    /// Plan and print the work list without probing
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_ping_count() -> u32 {
    100
}

fn default_ping_interval() -> f64 {
    0.2
}

fn default_time_budget() -> String {
    "60s".to_string()
}

fn default_max_parallel() -> usize {
    10
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ping_count: default_ping_count(),
            ping_interval: default_ping_interval(),
            time_budget: default_time_budget(),
            max_parallel: default_max_parallel(),
            symmetry: SymmetryMode::default(),
            dry_run: false,
            debug: false,
        }
    }
}

/// SSH transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Private key used for every node
    pub key: Option<PathBuf>,
    /// Login user for every node, overriding the per-cloud table
    pub user: Option<String>,
    /// Login user per cloud tag
    #[serde(default = "default_users")]
    pub users: BTreeMap<String, String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
}

fn default_connect_timeout() -> String {
    "10s".to_string()
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            key: None,
            user: None,
            users: default_users(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Where the node inventory comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Inventory JSON file; takes precedence over Terraform
    pub file: Option<PathBuf>,
    /// Terraform working directory exposing an `instances` output
    pub terraform_dir: Option<PathBuf>,
}

impl InventoryConfig {
    pub fn source(&self) -> InventorySource {
        match (&self.file, &self.terraform_dir) {
            (Some(file), _) => InventorySource::File(file.clone()),
            (None, Some(dir)) => InventorySource::Terraform(dir.clone()),
            (None, None) => InventorySource::Terraform(PathBuf::from(DEFAULT_TERRAFORM_DIR)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving results.json, inventory.json and report.md
    pub dir: Option<PathBuf>,
    /// Existing results.json to report on (report mode)
    pub results: Option<PathBuf>,
    /// Entries in the fastest/slowest report tables
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    10
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            results: None,
            top_n: default_top_n(),
        }
    }
}

impl OutputConfig {
    /// Configured directory, or `results/<YYYYmmdd_HHMMSS>` for this run
    pub fn dir_for_run(&self, now: DateTime<Local>) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            PathBuf::from(DEFAULT_RESULTS_ROOT).join(now.format("%Y%m%d_%H%M%S").to_string())
        })
    }
}

impl Config {
    pub fn time_budget(&self) -> Result<Duration> {
        cli_convert::parse_duration(&self.run.time_budget)
    }

    pub fn connect_timeout(&self) -> Result<Duration> {
        cli_convert::parse_duration(&self.ssh.connect_timeout)
    }

    /// Settings handed to the coordinator
    pub fn run_settings(&self) -> Result<RunSettings> {
        Ok(RunSettings {
            symmetry: self.run.symmetry,
            sample_count: self.run.ping_count,
            time_budget: self.time_budget()?,
            max_parallel: self.run.max_parallel,
        })
    }

    pub fn ping_options(&self) -> PingOptions {
        PingOptions {
            count: self.run.ping_count,
            interval_secs: self.run.ping_interval,
        }
    }

    pub fn ssh_users(&self) -> SshUsers {
        SshUsers {
            override_user: self.ssh.user.clone(),
            per_cloud: self.ssh.users.clone(),
            ..SshUsers::default()
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Run: {}", self.run)?;
        writeln!(f, "  SSH: {}", self.ssh)?;
        writeln!(f, "  Inventory: {}", self.inventory.source().describe())?;
        writeln!(f, "  Output: top_n={}", self.output.top_n)?;
        Ok(())
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pings every {}s, budget={}, max_parallel={}, mode={}",
            self.ping_count, self.ping_interval, self.time_budget, self.max_parallel, self.symmetry
        )?;
        if self.dry_run {
            write!(f, " (dry run)")?;
        }
        Ok(())
    }
}

impl fmt::Display for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(ref key) => write!(f, "key={}", key.display())?,
            None => write!(f, "key=<unset>")?,
        }
        match self.user {
            Some(ref user) => write!(f, ", user={}", user)?,
            None => write!(f, ", user=per-cloud")?,
        }
        write!(f, ", connect_timeout={}", self.connect_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.run.ping_count, 100);
        assert_eq!(config.run.ping_interval, 0.2);
        assert_eq!(config.run.max_parallel, 10);
        assert_eq!(config.run.symmetry, SymmetryMode::FullMeshDirected);
        assert_eq!(config.time_budget().unwrap(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout().unwrap(), Duration::from_secs(10));
        assert_eq!(config.output.top_n, 10);
        assert_eq!(config.ssh.users["azure"], "azureuser");
    }

    #[test]
    fn test_inventory_source_precedence() {
        let mut inventory = InventoryConfig::default();
        assert_eq!(
            inventory.source(),
            InventorySource::Terraform(PathBuf::from("terraform"))
        );

        inventory.terraform_dir = Some(PathBuf::from("/tf"));
        assert_eq!(inventory.source(), InventorySource::Terraform(PathBuf::from("/tf")));

        inventory.file = Some(PathBuf::from("nodes.json"));
        assert_eq!(inventory.source(), InventorySource::File(PathBuf::from("nodes.json")));
    }

    #[test]
    fn test_output_dir_for_run() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let output = OutputConfig::default();
        assert_eq!(output.dir_for_run(now), PathBuf::from("results/20240305_140709"));

        let output = OutputConfig {
            dir: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        };
        assert_eq!(output.dir_for_run(now), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_run_settings() {
        let mut config = Config::default();
        config.run.time_budget = "90s".to_string();
        config.run.ping_count = 20;
        config.run.symmetry = SymmetryMode::UniqueUndirected;

        let settings = config.run_settings().unwrap();
        assert_eq!(settings.time_budget, Duration::from_secs(90));
        assert_eq!(settings.sample_count, 20);
        assert_eq!(settings.symmetry, SymmetryMode::UniqueUndirected);
        assert_eq!(settings.max_parallel, 10);
    }

    #[test]
    fn test_ssh_users_override() {
        use crate::probe::ssh::UserLookup;

        let mut config = Config::default();
        assert_eq!(config.ssh_users().user_for("azure"), "azureuser");
        assert_eq!(config.ssh_users().user_for("gcp"), "ec2-user");

        config.ssh.user = Some("admin".to_string());
        assert_eq!(config.ssh_users().user_for("azure"), "admin");
    }

    #[test]
    fn test_display() {
        let text = Config::default().to_string();
        assert!(text.contains("100 pings every 0.2s"));
        assert!(text.contains("mode=full_mesh_directed"));
        assert!(text.contains("key=<unset>"));
    }
}
