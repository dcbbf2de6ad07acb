//! Configuration validation

use super::*;
use crate::config::cli::ExecutionMode;
use crate::config::cli_convert::parse_duration;
use anyhow::{Context, Result};

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_run(&config.run)?;
    validate_ssh(&config.ssh)?;
    validate_output(&config.output)?;

    Ok(())
}

/// Validate the configuration for a given execution mode
///
/// Measuring needs an SSH key unless it is a dry run; reporting needs a results
/// file or an output directory holding one.
pub fn validate_for_mode(config: &Config, mode: ExecutionMode) -> Result<()> {
    validate_config(config)?;

    match mode {
        ExecutionMode::Measure if !config.run.dry_run => {
            let key = config
                .ssh
                .key
                .as_ref()
                .context("An SSH key is required (--ssh-key or SSH_KEY)")?;
            if !key.exists() {
                anyhow::bail!("SSH key not found: {}", key.display());
            }
        }
        ExecutionMode::Report => {
            if config.output.results.is_none() && config.output.dir.is_none() {
                anyhow::bail!("report mode requires a results file or an output directory");
            }
        }
        _ => {}
    }

    Ok(())
}

/// Validate run parameters
pub fn validate_run(run: &RunConfig) -> Result<()> {
    if run.ping_count == 0 {
        anyhow::bail!("run.ping_count must be at least 1");
    }

    if !run.ping_interval.is_finite() || run.ping_interval <= 0.0 {
        anyhow::bail!("run.ping_interval must be a positive number of seconds, got {}", run.ping_interval);
    }

    if run.max_parallel == 0 {
        anyhow::bail!("run.max_parallel must be at least 1");
    }

    let budget = parse_duration(&run.time_budget)
        .with_context(|| format!("Invalid run.time_budget: {}", run.time_budget))?;
    if budget.is_zero() {
        anyhow::bail!("run.time_budget must be greater than 0");
    }

    // ping needs count * interval seconds before it prints its summary
    let ping_secs = run.ping_count as f64 * run.ping_interval;
    if ping_secs >= budget.as_secs_f64() {
        tracing::warn!(
            ping_secs,
            budget_secs = budget.as_secs_f64(),
            "Time budget is shorter than the ping run; pairs will time out"
        );
    }

    Ok(())
}

/// Validate SSH settings
pub fn validate_ssh(ssh: &SshConfig) -> Result<()> {
    let timeout = parse_duration(&ssh.connect_timeout)
        .with_context(|| format!("Invalid ssh.connect_timeout: {}", ssh.connect_timeout))?;
    if timeout.as_secs() == 0 {
        anyhow::bail!("ssh.connect_timeout must be at least 1s");
    }

    if let Some(ref user) = ssh.user {
        if user.trim().is_empty() {
            anyhow::bail!("ssh.user must not be empty");
        }
    }

    for (cloud, user) in &ssh.users {
        if user.trim().is_empty() {
            anyhow::bail!("ssh.users.{} must not be empty", cloud);
        }
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if output.top_n == 0 {
        anyhow::bail!("output.top_n must be at least 1");
    }

    Ok(())
}
