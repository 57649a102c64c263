//! volgrid placement — decides which node serves each input stream.
//!
//! This crate turns a cluster definition plus a clean discovery outcome
//! into a node assignment: the head node, one node per input stream, and
//! every compute node with the number of threads it may still run.
//!
//! # Components
//!
//! - **`allocator`** — stream → node mapping (storage areas, recorders, fallback)
//! - **`budget`** — per compute node thread budget
//! - **`output`** — node-assignment and thread-budget files

pub mod allocator;
pub mod budget;
pub mod error;
pub mod output;

pub use allocator::{NodeAssignment, allocate};
pub use budget::{ThreadBudget, compute_thread_budget};
pub use error::{PlacementError, PlacementResult};
pub use output::{FileAccess, write_job_outputs, write_machines_file, write_threads_file};
