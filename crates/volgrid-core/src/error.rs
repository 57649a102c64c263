//! Error types for volgrid core operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::version::TopologyVersion;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading inputs or validating them before discovery.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cluster definition: {0}")]
    InvalidClusterDefinition(String),

    #[error("invalid cluster definition version: {0:?}")]
    InvalidVersion(String),

    #[error(
        "cluster definition version {found} is too old, at least {required} is required"
    )]
    VersionMismatch {
        found: TopologyVersion,
        required: TopologyVersion,
    },

    #[error("hostname ({host}) is not an allowed head node in the cluster definition")]
    NotHeadNode { host: String },

    #[error("job description must have an .input extension: {0}")]
    NotAJobFile(PathBuf),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("datastream table entry {0} is referenced by more than one active stream")]
    DuplicateStreamIndex(usize),

    #[error("datastream {index} has unsupported data source {kind:?}")]
    UnsupportedDataSource { index: usize, kind: String },

    #[error("active stream {0} references a datastream that is not defined")]
    UndefinedStream(usize),

    #[error("active stream {0} carries no volume, path or array serials")]
    EmptyStream(usize),

    #[error("serial {serial} is required by streams {first} and {second}")]
    DuplicateIdentifier {
        serial: String,
        first: usize,
        second: usize,
    },
}
