//! Cluster definition: which machines exist and what each one may do.
//!
//! The allocator only talks to the [`Topology`] trait. [`ClusterDefinition`]
//! is the TOML-backed implementation loaded by the CLI:
//!
//! ```toml
//! version = "1.0"
//!
//! [[node]]
//! name = "head1"
//! head = true
//! threads = 4
//!
//! [[node]]
//! name = "mark5-1"
//! module_host = true
//! storage = ["/data/exp1"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::version::TopologyVersion;

/// A machine contributing processing threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNode {
    pub name: String,
    pub threads: u32,
}

/// A machine that owns one or more storage areas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNode {
    pub name: String,
    pub url_prefixes: Vec<String>,
}

/// Read-only view of the cluster used by the gates and the allocator.
///
/// Every list is returned in topology (declaration) order.
pub trait Topology {
    fn head_node_names(&self) -> Vec<String>;
    fn compute_nodes(&self) -> Vec<ComputeNode>;
    fn storage_nodes(&self) -> Vec<StorageNode>;
    fn module_host_names(&self) -> Vec<String>;
    fn array_host_names(&self) -> Vec<String>;
    fn version(&self) -> TopologyVersion;
}

/// Reject invocations from a machine that is not an allowed head node.
pub fn ensure_head_node(topology: &impl Topology, host: &str) -> CoreResult<()> {
    if topology.head_node_names().iter().any(|name| name == host) {
        Ok(())
    } else {
        Err(CoreError::NotHeadNode {
            host: host.to_string(),
        })
    }
}

/// One `[[node]]` table of the cluster definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeEntry {
    pub name: String,
    /// May initiate jobs.
    #[serde(default)]
    pub head: bool,
    /// Processing threads; a node with zero threads is not a compute node.
    #[serde(default)]
    pub threads: u32,
    /// May host removable modules.
    #[serde(default)]
    pub module_host: bool,
    /// May host disk arrays.
    #[serde(default)]
    pub array_host: bool,
    /// Storage area path prefixes served by this node.
    #[serde(default)]
    pub storage: Vec<String>,
}

/// TOML cluster definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterDefinition {
    pub version: TopologyVersion,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeEntry>,
}

impl ClusterDefinition {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        let definition: ClusterDefinition = toml::from_str(content)
            .map_err(|e| CoreError::InvalidClusterDefinition(e.to_string()))?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> CoreResult<()> {
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if node.name.trim().is_empty() {
                return Err(CoreError::InvalidClusterDefinition(
                    "node with empty name".to_string(),
                ));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(CoreError::InvalidClusterDefinition(format!(
                    "node {} is defined more than once",
                    node.name
                )));
            }
        }
        Ok(())
    }

    fn names_where(&self, pred: impl Fn(&NodeEntry) -> bool) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| pred(n))
            .map(|n| n.name.clone())
            .collect()
    }
}

impl Topology for ClusterDefinition {
    fn head_node_names(&self) -> Vec<String> {
        self.names_where(|n| n.head)
    }

    fn compute_nodes(&self) -> Vec<ComputeNode> {
        self.nodes
            .iter()
            .filter(|n| n.threads > 0)
            .map(|n| ComputeNode {
                name: n.name.clone(),
                threads: n.threads,
            })
            .collect()
    }

    fn storage_nodes(&self) -> Vec<StorageNode> {
        self.nodes
            .iter()
            .filter(|n| !n.storage.is_empty())
            .map(|n| StorageNode {
                name: n.name.clone(),
                url_prefixes: n.storage.clone(),
            })
            .collect()
    }

    fn module_host_names(&self) -> Vec<String> {
        self.names_where(|n| n.module_host)
    }

    fn array_host_names(&self) -> Vec<String> {
        self.names_where(|n| n.array_host)
    }

    fn version(&self) -> TopologyVersion {
        self.version
    }
}
