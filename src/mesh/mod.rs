//! Pair generation
//!
//! Derives the measurement work list from a node set. Pairs are only ever formed
//! between nodes of the same (cloud, region) group.
//!
//! # Modes
//!
//! - **Full mesh, directed**: every ordered pair (a, b) with a != b. Latency is
//!   treated as potentially asymmetric, so A->B and B->A are measured separately.
//! - **Unique, undirected**: every unordered pair {a, b} once. Used when the probe
//!   already measures a symmetric round-trip cost.
//!
//! Pairs whose endpoints report the same zone id are never measured. They are
//! returned separately in [`MeshPlan::same_zone`] so the run can account for them
//! as skip records.
//!
//! # Example
//!
//! ```
//! use latmesh::inventory::Inventory;
//! use latmesh::mesh::{self, SymmetryMode};
//!
//! let inventory = Inventory::from_json_str(r#"{
//!     "a": {"region": "r1", "public_ip": "1.0.0.1", "private_ip": "10.0.0.1"},
//!     "b": {"region": "r1", "public_ip": "1.0.0.2", "private_ip": "10.0.0.2"},
//!     "c": {"region": "r2", "public_ip": "1.0.0.3", "private_ip": "10.0.0.3"}
//! }"#).unwrap();
//!
//! let pairs = mesh::generate(inventory.nodes(), SymmetryMode::UniqueUndirected);
//! assert_eq!(pairs.len(), 1);
//! assert_eq!(pairs[0].source.id, "a");
//! assert_eq!(pairs[0].target.id, "b");
//! ```

use crate::inventory::{group_nodes, GroupKey, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How pairs are formed within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetryMode {
    /// Every ordered pair, both directions measured independently
    FullMeshDirected,
    /// Every unordered pair exactly once
    UniqueUndirected,
}

impl Default for SymmetryMode {
    fn default() -> Self {
        Self::FullMeshDirected
    }
}

impl fmt::Display for SymmetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymmetryMode::FullMeshDirected => write!(f, "full_mesh_directed"),
            SymmetryMode::UniqueUndirected => write!(f, "unique_undirected"),
        }
    }
}

/// One source -> target comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub source: Node,
    pub target: Node,
}

impl Pair {
    pub fn new(source: Node, target: Node) -> Self {
        Self { source, target }
    }

    /// Group both endpoints belong to
    pub fn group(&self) -> GroupKey {
        self.source.group()
    }

    /// Both endpoints report the same availability zone
    pub fn is_same_zone(&self) -> bool {
        self.source.zone_id == self.target.zone_id
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.id, self.target.id)
    }
}

/// Work list for one run
#[derive(Debug, Clone, Default)]
pub struct MeshPlan {
    /// Pairs to measure, in deterministic order
    pub work: Vec<Pair>,
    /// Pairs excluded because both endpoints share a zone id
    pub same_zone: Vec<Pair>,
}

impl MeshPlan {
    /// Every intended comparison, measured or skipped
    pub fn total(&self) -> usize {
        self.work.len() + self.same_zone.len()
    }

    /// Work pairs per group
    pub fn work_per_group(&self) -> BTreeMap<GroupKey, usize> {
        let mut counts = BTreeMap::new();
        for pair in &self.work {
            *counts.entry(pair.group()).or_insert(0) += 1;
        }
        counts
    }
}

/// Generate the measurement work list
///
/// Same-zone pairs are left out; use [`plan`] to get them as well.
pub fn generate(nodes: &[Node], mode: SymmetryMode) -> Vec<Pair> {
    plan(nodes, mode).work
}

/// Generate work pairs and same-zone exclusions
///
/// Groups are visited in (cloud, region) order and members in id order, so the
/// output is identical across invocations for the same input.
pub fn plan(nodes: &[Node], mode: SymmetryMode) -> MeshPlan {
    let mut plan = MeshPlan::default();

    for members in group_nodes(nodes).into_values() {
        for (i, source) in members.iter().enumerate() {
            for (j, target) in members.iter().enumerate() {
                let wanted = match mode {
                    SymmetryMode::FullMeshDirected => i != j,
                    SymmetryMode::UniqueUndirected => i < j,
                };
                if !wanted {
                    continue;
                }

                let pair = Pair::new((*source).clone(), (*target).clone());
                if pair.is_same_zone() {
                    plan.same_zone.push(pair);
                } else {
                    plan.work.push(pair);
                }
            }
        }
    }

    plan
}
