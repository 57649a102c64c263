//! volgrid-cli — library half of the `volgrid` binary.
//!
//! The binary only parses arguments, installs logging and maps results to
//! exit codes; everything testable lives here.

pub mod report;
pub mod slots;
pub mod workflow;

pub use report::{ReportContext, ReportFormat};
pub use slots::{GetSlotCommand, SlotLocator};
pub use workflow::{JobOptions, JobPlan, JobStatus};
