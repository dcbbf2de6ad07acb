//! latmesh CLI entry point

use anyhow::{Context, Result};
use chrono::Local;
use latmesh::config::cli::{Cli, ExecutionMode};
use latmesh::config::{toml::load_config, validator::validate_for_mode, Config};
use latmesh::coordinator::MeshCoordinator;
use latmesh::inventory::Inventory;
use latmesh::mesh;
use latmesh::output::json::{self, INVENTORY_FILE, RESULTS_FILE};
use latmesh::output::markdown::{self, REPORT_FILE};
use latmesh::output::text;
use latmesh::probe::ssh::SshProbe;
use latmesh::probe::SharedProbe;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    init_tracing(cli.debug);

    let config = load_config(&cli)?;
    validate_for_mode(&config, cli.mode).context("Configuration validation failed")?;

    println!("latmesh v{}", env!("CARGO_PKG_VERSION"));
    println!("Availability zone latency mesh");
    println!();

    if config.run.debug {
        print!("{}", config);
        println!();
    }

    match cli.mode {
        ExecutionMode::Measure => run_measure(&config),
        ExecutionMode::Plan => run_plan(&config),
        ExecutionMode::Report => run_report(&config),
    }
}

/// Install the tracing subscriber; `RUST_LOG` takes precedence
fn init_tracing(debug: bool) {
    let default = if debug { "latmesh=debug" } else { "latmesh=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_inventory(runtime: &Runtime, config: &Config) -> Result<Inventory> {
    let source = config.inventory.source();
    tracing::info!("Loading inventory from {}", source.describe());
    let inventory = runtime.block_on(source.load())?;
    tracing::info!(
        nodes = inventory.len(),
        groups = inventory.groups().len(),
        "Inventory loaded"
    );
    Ok(inventory)
}

/// Measure every pair and write results, inventory and report
fn run_measure(config: &Config) -> Result<()> {
    let runtime = Runtime::new().context("Failed to create tokio runtime")?;
    let inventory = load_inventory(&runtime, config)?;

    if config.run.dry_run {
        let plan = mesh::plan(inventory.nodes(), config.run.symmetry);
        text::print_plan(&plan);
        println!();
        println!("Dry run: no probes executed");
        return Ok(());
    }

    let key = config
        .ssh
        .key
        .clone()
        .context("An SSH key is required (--ssh-key or SSH_KEY)")?;
    let probe = SshProbe::new(
        key,
        config.ssh_users(),
        config.ping_options(),
        config.connect_timeout()?,
    );
    let settings = config.run_settings()?;

    let output_dir = config.output.dir_for_run(Local::now());
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    json::write_inventory(&output_dir.join(INVENTORY_FILE), &inventory)?;

    let coordinator = MeshCoordinator::new(inventory, settings, Arc::new(SharedProbe::new(probe)));
    let set = runtime.block_on(coordinator.run())?;

    json::write_results(&output_dir.join(RESULTS_FILE), &set, true)?;
    markdown::write_report(&output_dir.join(REPORT_FILE), &set, config.output.top_n)?;

    println!();
    text::print_summary(&set, config.output.top_n);
    println!();
    text::print_output_files(&output_dir, &[RESULTS_FILE, INVENTORY_FILE, REPORT_FILE]);

    Ok(())
}

/// Print the pair plan without probing
fn run_plan(config: &Config) -> Result<()> {
    let runtime = Runtime::new().context("Failed to create tokio runtime")?;
    let inventory = load_inventory(&runtime, config)?;
    let plan = mesh::plan(inventory.nodes(), config.run.symmetry);
    text::print_plan(&plan);
    Ok(())
}

/// Regenerate report.md from an existing results.json
fn run_report(config: &Config) -> Result<()> {
    let results_path = match (&config.output.results, &config.output.dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => dir.join(RESULTS_FILE),
        (None, None) => anyhow::bail!("report mode requires a results file or an output directory"),
    };

    let set = json::read_results(&results_path)?;

    let report_dir = match config.output.dir {
        Some(ref dir) => dir.clone(),
        None => results_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&report_dir)
        .with_context(|| format!("Failed to create output directory: {}", report_dir.display()))?;
    let report_path = report_dir.join(REPORT_FILE);
    markdown::write_report(&report_path, &set, config.output.top_n)?;

    text::print_summary(&set, config.output.top_n);
    println!();
    println!("Report generated: {}", report_path.display());
    Ok(())
}
