//! Compute thread budget.
//!
//! A compute node gives up one thread for every input stream it reads and
//! one more if it also runs the head process.

use serde::Serialize;
use volgrid_core::ComputeNode;

use crate::error::{PlacementError, PlacementResult};

/// Threads a compute node may still use for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadBudget {
    pub node: String,
    pub threads: u32,
}

/// Budget for every compute node, in topology order.
///
/// `data_nodes` is the node chosen for each input stream; a node listed
/// twice serves two streams.
pub fn compute_thread_budget(
    compute_nodes: &[ComputeNode],
    data_nodes: &[String],
    head_node: &str,
) -> PlacementResult<Vec<ThreadBudget>> {
    compute_nodes
        .iter()
        .map(|node| {
            let data_streams = data_nodes.iter().filter(|n| **n == node.name).count() as u32;
            let head_overhead = u32::from(node.name == head_node);
            let threads = node
                .threads
                .checked_sub(data_streams + head_overhead)
                .ok_or_else(|| PlacementError::NegativeThreadBudget {
                    node: node.name.clone(),
                    threads: node.threads,
                    data_streams,
                    head_overhead,
                })?;
            Ok(ThreadBudget {
                node: node.name.clone(),
                threads,
            })
        })
        .collect()
}
