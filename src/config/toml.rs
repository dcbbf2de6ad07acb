//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::{convert_symmetry, parse_duration};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the configuration for a CLI invocation
///
/// Reads `--config` when given, otherwise starts from defaults, then applies
/// the CLI overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Run parameters
    if let Some(count) = cli.ping_count {
        config.run.ping_count = count;
    }
    if let Some(workers) = cli.max_workers {
        config.run.max_parallel = workers;
    }
    if let Some(ref timeout) = cli.timeout {
        // Reject malformed values before the run starts
        parse_duration(timeout)?;
        config.run.time_budget = timeout.clone();
    }
    if let Some(symmetry) = cli.symmetry {
        config.run.symmetry = convert_symmetry(symmetry);
    }
    if cli.dry_run {
        config.run.dry_run = true;
    }
    if cli.debug {
        config.run.debug = true;
    }

    // SSH
    if let Some(ref key) = cli.ssh_key {
        config.ssh.key = Some(key.clone());
    }
    if let Some(ref user) = cli.ssh_user {
        config.ssh.user = Some(user.clone());
    }

    // Inventory: a CLI source replaces whatever the file chose
    if let Some(ref file) = cli.inventory {
        config.inventory.file = Some(file.clone());
        config.inventory.terraform_dir = None;
    } else if let Some(ref dir) = cli.terraform_dir {
        config.inventory.file = None;
        config.inventory.terraform_dir = Some(dir.clone());
    }

    // Output
    if let Some(ref dir) = cli.output_dir {
        config.output.dir = Some(dir.clone());
    }
    if let Some(ref results) = cli.results {
        config.output.results = Some(results.clone());
    }
    if let Some(top_n) = cli.top_n {
        config.output.top_n = top_n;
    }

    Ok(config)
}
