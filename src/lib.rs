//! latmesh - Availability zone latency mesh
//!
//! latmesh measures network latency between every pair of availability zones
//! inside each (cloud, region), using one measurement node per zone, and
//! summarizes the results.
//!
//! # Architecture
//!
//! - **Inventory**: nodes from a JSON file or Terraform output
//! - **Mesh**: per-group pair generation (directed or undirected)
//! - **Probe**: pluggable latency measurement (SSH + ping, mock)
//! - **Scheduler**: bounded parallel execution per group with per-pair timeouts
//! - **Stats**: immutable result set with rankings and rollups
//! - **Output**: results.json, report.md and a console summary

pub mod config;
pub mod coordinator;
pub mod executor;
pub mod inventory;
pub mod mesh;
pub mod output;
pub mod probe;
pub mod scheduler;
pub mod stats;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{MeshCoordinator, RunSettings};
pub use inventory::Inventory;
pub use stats::aggregator::MeasurementSet;

/// Result type used throughout latmesh
pub type Result<T> = anyhow::Result<T>;
