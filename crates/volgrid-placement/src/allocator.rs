//! Node allocator — maps every input stream onto a cluster node.
//!
//! Given the cluster definition and a discovery outcome, the allocator
//! decides, stream by stream in declared order:
//! 1. File streams go to the one storage node whose area contains the path,
//!    or to the next compute node not already reading a stream.
//! 2. Module streams go to the recorder that reported the volume.
//! 3. Disk-array streams go to the recorder that reported the array.
//!
//! The result does not depend on hash iteration order: all lookups walk
//! topology-ordered lists or the sorted discovery outcome.

use serde::Serialize;
use tracing::{debug, info, warn};
use volgrid_core::{InputStream, Topology};
use volgrid_discovery::{DiscoveryOutcome, StatusRecord};

use crate::budget::{ThreadBudget, compute_thread_budget};
use crate::error::{PlacementError, PlacementResult};

/// Final placement of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeAssignment {
    pub head_node: String,
    /// One node per input stream, in stream order.
    pub stream_nodes: Vec<String>,
    /// Every compute node in topology order with its thread budget.
    pub compute: Vec<ThreadBudget>,
}

impl NodeAssignment {
    /// Head node, then the stream nodes, then every compute node.
    pub fn ordered_node_names(&self) -> Vec<&str> {
        std::iter::once(self.head_node.as_str())
            .chain(self.stream_nodes.iter().map(String::as_str))
            .chain(self.compute.iter().map(|b| b.node.as_str()))
            .collect()
    }

    /// Threads per compute node, same order as the compute section of
    /// [`ordered_node_names`](Self::ordered_node_names).
    pub fn thread_budget(&self) -> Vec<u32> {
        self.compute.iter().map(|b| b.threads).collect()
    }
}

/// Compute the node assignment for `streams`.
pub fn allocate(
    topology: &impl Topology,
    head_node: &str,
    streams: &[InputStream],
    outcome: &DiscoveryOutcome,
) -> PlacementResult<NodeAssignment> {
    let module_hosts = topology.module_host_names();
    let array_hosts = topology.array_host_names();
    let compute_nodes = topology.compute_nodes();

    let mut stream_nodes: Vec<String> = Vec::with_capacity(streams.len());

    for (idx, stream) in streams.iter().enumerate() {
        let node = match stream {
            InputStream::File { path } => {
                place_file(topology, &compute_nodes, &stream_nodes, idx, path)?
            }
            InputStream::Module { volume } => {
                let record = outcome.location_of(volume).ok_or_else(|| {
                    PlacementError::StreamNotLocated {
                        stream: idx,
                        serial: volume.clone(),
                    }
                })?;
                place_on_recorder(record, &module_hosts, idx, "module")?
            }
            InputStream::DiskArray { serials } => {
                let record = locate_array(outcome, serials).ok_or_else(|| {
                    PlacementError::StreamNotLocated {
                        stream: idx,
                        serial: serials.first().cloned().unwrap_or_default(),
                    }
                })?;
                place_on_recorder(record, &array_hosts, idx, "disk array")?
            }
        };
        debug!(stream = idx, kind = %stream.kind(), %node, "stream placed");
        stream_nodes.push(node);
    }

    let compute = compute_thread_budget(&compute_nodes, &stream_nodes, head_node)?;

    info!(
        head = head_node,
        streams = stream_nodes.len(),
        compute_nodes = compute.len(),
        "allocation complete"
    );

    Ok(NodeAssignment {
        head_node: head_node.to_string(),
        stream_nodes,
        compute,
    })
}

fn place_file(
    topology: &impl Topology,
    compute_nodes: &[volgrid_core::ComputeNode],
    taken: &[String],
    idx: usize,
    path: &str,
) -> PlacementResult<String> {
    let mut matches: Vec<String> = topology
        .storage_nodes()
        .into_iter()
        .filter(|node| node.url_prefixes.iter().any(|url| path.starts_with(url.as_str())))
        .map(|node| node.name)
        .collect();

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => {
            let fallback = compute_nodes
                .iter()
                .find(|node| !taken.contains(&node.name))
                .ok_or_else(|| PlacementError::NoComputeNodeAvailable {
                    stream: idx,
                    path: path.to_string(),
                })?;
            debug!(stream = idx, path, node = %fallback.name, "no storage area matches, using compute node");
            Ok(fallback.name.clone())
        }
        _ => Err(PlacementError::AmbiguousStorageArea {
            path: path.to_string(),
            nodes: matches,
        }),
    }
}

/// Record that located the first serial of the array found by discovery.
fn locate_array<'a>(outcome: &'a DiscoveryOutcome, serials: &[String]) -> Option<&'a StatusRecord> {
    let mut found = serials.iter().filter_map(|s| outcome.location_of(s));
    let first = found.next()?;
    if found.any(|other| other.origin_host != first.origin_host) {
        warn!(
            host = %first.origin_host,
            "disk array serials reported by more than one host, using the first"
        );
    }
    Some(first)
}

/// Prefer the unit name the recorder reports, else the host the response
/// came from. Either way the node must be an allowed host for its role.
fn place_on_recorder(
    record: &StatusRecord,
    allowed: &[String],
    idx: usize,
    role: &'static str,
) -> PlacementResult<String> {
    let node = if allowed.contains(&record.unit) {
        &record.unit
    } else {
        &record.origin_host
    };
    if !allowed.contains(node) {
        return Err(PlacementError::UnassignableStream {
            stream: idx,
            node: node.clone(),
            role,
        });
    }
    Ok(node.clone())
}
