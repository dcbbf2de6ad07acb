//! Node inventory
//!
//! The inventory is the set of measurable endpoints, one per availability zone,
//! keyed by node id. It is produced outside the measurement core (a JSON file or
//! Terraform output, see [`source`]) and only has to satisfy the node invariants
//! checked by [`Inventory::validate`].
//!
//! # Input format
//!
//! ```text
//! {
//!   "use1-az1": {
//!     "az_id": "use1-az1",
//!     "cloud": "aws",
//!     "region": "us-east-1",
//!     "public_ip": "54.1.2.3",
//!     "private_ip": "10.0.1.10"
//!   }
//! }
//! ```
//!
//! `cloud` defaults to `aws` and `az_id` defaults to the node id.

pub mod source;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Cloud tag assumed when an inventory entry does not carry one
pub const DEFAULT_CLOUD: &str = "aws";

/// Inventory validation errors
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory contains no nodes")]
    Empty,

    #[error("node '{node}' has an empty {field}")]
    MissingField { node: String, field: &'static str },

    #[error("inventory contains an empty node id")]
    EmptyId,

    #[error("invalid inventory JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One inventory entry as supplied by the provisioning tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Availability zone id reported by the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub az_id: Option<String>,
    /// Cloud provider tag
    #[serde(default = "default_cloud")]
    pub cloud: String,
    /// Region the node lives in
    pub region: String,
    /// Address used to reach the node (SSH)
    pub public_ip: String,
    /// Address other nodes probe against
    pub private_ip: String,
}

fn default_cloud() -> String {
    DEFAULT_CLOUD.to_string()
}

/// A measurable endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Inventory key, unique within the inventory
    pub id: String,
    /// Zone id the node reports (two nodes may report the same zone)
    pub zone_id: String,
    pub cloud: String,
    pub region: String,
    /// Address the probe connects to in order to run on this node
    pub connect_address: String,
    /// Address other nodes should probe against
    pub target_address: String,
}

impl Node {
    /// Group this node belongs to
    pub fn group(&self) -> GroupKey {
        GroupKey::new(&self.cloud, &self.region)
    }
}

/// (cloud, region) partition within which pairs are generated
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub cloud: String,
    pub region: String,
}

impl GroupKey {
    pub fn new(cloud: &str, region: &str) -> Self {
        Self {
            cloud: cloud.to_string(),
            region: region.to_string(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cloud, self.region)
    }
}

/// Validated node inventory
///
/// Nodes are kept sorted by id so every traversal is deterministic.
#[derive(Debug, Clone)]
pub struct Inventory {
    entries: BTreeMap<String, InventoryEntry>,
    nodes: Vec<Node>,
}

impl Inventory {
    /// Build an inventory from raw entries, validating node invariants
    pub fn from_entries(entries: BTreeMap<String, InventoryEntry>) -> Result<Self, InventoryError> {
        let nodes = entries
            .iter()
            .map(|(id, entry)| Node {
                id: id.clone(),
                zone_id: entry.az_id.clone().unwrap_or_else(|| id.clone()),
                cloud: entry.cloud.clone(),
                region: entry.region.clone(),
                connect_address: entry.public_ip.clone(),
                target_address: entry.private_ip.clone(),
            })
            .collect();

        let inventory = Self { entries, nodes };
        inventory.validate()?;
        Ok(inventory)
    }

    /// Parse an inventory from its JSON representation
    pub fn from_json_str(json: &str) -> Result<Self, InventoryError> {
        let entries: BTreeMap<String, InventoryEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    /// Check the invariants every node must satisfy
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.nodes.is_empty() {
            return Err(InventoryError::Empty);
        }

        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(InventoryError::EmptyId);
            }
            let fields = [
                ("zone id", &node.zone_id),
                ("cloud", &node.cloud),
                ("region", &node.region),
                ("public_ip", &node.connect_address),
                ("private_ip", &node.target_address),
            ];
            for (field, value) in fields {
                if value.trim().is_empty() {
                    return Err(InventoryError::MissingField {
                        node: node.id.clone(),
                        field,
                    });
                }
            }
        }

        Ok(())
    }

    /// All nodes, sorted by id
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes partitioned by (cloud, region), groups and members in stable order
    pub fn groups(&self) -> BTreeMap<GroupKey, Vec<&Node>> {
        group_nodes(&self.nodes)
    }

    /// Sorted list of clouds present
    pub fn clouds(&self) -> Vec<String> {
        let mut clouds: Vec<String> = self.nodes.iter().map(|n| n.cloud.clone()).collect();
        clouds.sort();
        clouds.dedup();
        clouds
    }

    /// Regions present per cloud
    pub fn regions(&self) -> BTreeMap<String, Vec<String>> {
        let mut regions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in self.groups().into_keys() {
            regions.entry(key.cloud).or_default().push(key.region);
        }
        regions
    }

    /// Raw entries, as supplied
    pub fn entries(&self) -> &BTreeMap<String, InventoryEntry> {
        &self.entries
    }

    /// Pretty JSON in the input format, for saving alongside results
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

/// Partition nodes by group, sorting members by id
pub fn group_nodes(nodes: &[Node]) -> BTreeMap<GroupKey, Vec<&Node>> {
    let mut groups: BTreeMap<GroupKey, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        groups.entry(node.group()).or_default().push(node);
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| a.id.cmp(&b.id));
    }
    groups
}
