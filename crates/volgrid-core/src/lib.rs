//! volgrid-core — shared model for locating recorded volumes and
//! allocating nodes to a correlation job.
//!
//! # Components
//!
//! - **`types`** — input streams declared by a job
//! - **`topology`** — the cluster definition (`Topology` trait + TOML loader)
//! - **`version`** — cluster definition version gate
//! - **`job`** — job description (`.input`) parser
//! - **`required`** — the set of serials a discovery run must locate

pub mod error;
pub mod job;
pub mod required;
pub mod topology;
pub mod types;
pub mod version;

pub use error::{CoreError, CoreResult};
pub use job::{JobDescription, JobPaths};
pub use required::RequiredSet;
pub use topology::{ClusterDefinition, ComputeNode, NodeEntry, StorageNode, Topology, ensure_head_node};
pub use types::{InputStream, StreamKind};
pub use version::{MIN_TOPOLOGY_VERSION, TopologyVersion};
