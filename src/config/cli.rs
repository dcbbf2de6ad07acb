//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Measure latency between every zone pair (default)
    Measure,
    /// Print the pair plan without probing
    Plan,
    /// Regenerate the report from an existing results.json
    Report,
}

/// Pair symmetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Symmetry {
    /// Measure A->B and B->A separately
    FullMeshDirected,
    /// Measure each unordered pair once
    UniqueUndirected,
}

/// latmesh - Intra-region availability zone latency mesh
#[derive(Parser, Debug)]
#[command(name = "latmesh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: measure, plan, or report
    #[arg(long, value_enum, default_value = "measure")]
    pub mode: ExecutionMode,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Inventory ===
    /// Path to inventory JSON (skips Terraform)
    #[arg(long)]
    pub inventory: Option<PathBuf>,

    /// Terraform directory exposing an `instances` output
    #[arg(long)]
    pub terraform_dir: Option<PathBuf>,

    // === Output ===
    /// Output directory (default: results/YYYYmmdd_HHMMSS)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Existing results.json (report mode)
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Entries in the fastest/slowest report tables
    #[arg(long)]
    pub top_n: Option<usize>,

    // === SSH ===
    /// Path to SSH private key
    #[arg(long, env = "SSH_KEY")]
    pub ssh_key: Option<PathBuf>,

    /// SSH username override (default: per cloud)
    #[arg(long)]
    pub ssh_user: Option<String>,

    // === Measurement ===
    /// Ping packets per measurement
    #[arg(long, env = "PING_COUNT")]
    pub ping_count: Option<u32>,

    /// Max parallel SSH connections per region
    #[arg(long, env = "PARALLEL_JOBS")]
    pub max_workers: Option<usize>,

    /// Time budget per pair (e.g., 60s, 2m)
    #[arg(long)]
    pub timeout: Option<String>,

    /// Pair symmetry
    #[arg(long, value_enum)]
    pub symmetry: Option<Symmetry>,

    /// Plan the run without probing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mode == ExecutionMode::Report && self.results.is_none() && self.output_dir.is_none() {
            anyhow::bail!("report mode requires --results or --output-dir");
        }

        if self.ping_count == Some(0) {
            anyhow::bail!("ping_count must be at least 1");
        }

        if self.max_workers == Some(0) {
            anyhow::bail!("max_workers must be at least 1");
        }

        if self.inventory.is_some() && self.terraform_dir.is_some() {
            anyhow::bail!("can only specify one of --inventory or --terraform-dir");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["latmesh"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.mode, ExecutionMode::Measure);
        assert!(cli.symmetry.is_none());
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_parse_flags() {
        let cli = parse(&[
            "--mode",
            "plan",
            "--inventory",
            "nodes.json",
            "--ssh-key",
            "/keys/id",
            "--ping-count",
            "20",
            "--max-workers",
            "4",
            "--symmetry",
            "unique-undirected",
            "--timeout",
            "30s",
        ]);
        assert_eq!(cli.mode, ExecutionMode::Plan);
        assert_eq!(cli.inventory, Some(PathBuf::from("nodes.json")));
        assert_eq!(cli.ssh_key, Some(PathBuf::from("/keys/id")));
        assert_eq!(cli.ping_count, Some(20));
        assert_eq!(cli.max_workers, Some(4));
        assert_eq!(cli.symmetry, Some(Symmetry::UniqueUndirected));
        assert_eq!(cli.timeout.as_deref(), Some("30s"));
        cli.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let cli = parse(&["--max-workers", "0"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validate_report_needs_results() {
        let cli = parse(&["--mode", "report"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["--mode", "report", "--results", "results.json"]);
        cli.validate().unwrap();
    }

    #[test]
    fn test_validate_single_inventory_source() {
        let cli = parse(&["--inventory", "a.json", "--terraform-dir", "tf"]);
        assert!(cli.validate().is_err());
    }
}
