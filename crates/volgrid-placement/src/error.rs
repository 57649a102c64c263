//! Error types for node allocation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Reasons the cluster cannot host the job as described.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("storage area for {path} is associated with more than one host: {nodes:?}")]
    AmbiguousStorageArea { path: String, nodes: Vec<String> },

    #[error("stream {stream}: serial {serial} was not located by discovery")]
    StreamNotLocated { stream: usize, serial: String },

    #[error("stream {stream}: {node:?} is not listed as an active {role} host")]
    UnassignableStream {
        stream: usize,
        node: String,
        role: &'static str,
    },

    #[error("stream {stream}: no unused compute node left to read {path}")]
    NoComputeNodeAvailable { stream: usize, path: String },

    #[error(
        "compute node {node} has {threads} threads but needs {data_streams} for data streams and {head_overhead} for the head node"
    )]
    NegativeThreadBudget {
        node: String,
        threads: u32,
        data_streams: u32,
        head_overhead: u32,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove previous {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
