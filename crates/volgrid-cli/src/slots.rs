//! Library slot lookup for modules discovery could not find.
//!
//! Operators with the module database installed can pass `--difxdb`; the
//! `getslot` tool then tells them which library shelf each missing module
//! should be in. The lookup is best effort and never blocks the run for
//! long.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Slot shown when the lookup gives no answer.
pub const UNKNOWN_SLOT: &str = "unknown";

pub trait SlotLocator {
    /// Library slot of `serial`, `None` when it cannot be determined.
    fn locate(&self, serial: &str) -> impl Future<Output = Option<String>>;
}

/// Runs `getslot <serial>` and takes its trimmed stdout as the slot.
#[derive(Debug, Clone)]
pub struct GetSlotCommand {
    program: PathBuf,
    timeout: Duration,
}

impl Default for GetSlotCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("getslot"),
            timeout: Duration::from_secs(10),
        }
    }
}

impl GetSlotCommand {
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SlotLocator for GetSlotCommand {
    async fn locate(&self, serial: &str) -> Option<String> {
        let run = Command::new(&self.program)
            .arg(serial)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) if output.status.success() => {
                let slot = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!slot.is_empty()).then_some(slot)
            }
            Ok(Ok(output)) => {
                debug!(serial, status = %output.status, "slot lookup failed");
                None
            }
            Ok(Err(e)) => {
                debug!(serial, program = %self.program.display(), error = %e, "cannot run slot lookup");
                None
            }
            Err(_elapsed) => {
                debug!(serial, "slot lookup timed out");
                None
            }
        }
    }
}

/// Slot of every serial in `missing`, [`UNKNOWN_SLOT`] where the lookup failed.
pub async fn locate_missing(locator: &impl SlotLocator, missing: &[String]) -> BTreeMap<String, String> {
    let mut slots = BTreeMap::new();
    for serial in missing {
        let slot = locator
            .locate(serial)
            .await
            .unwrap_or_else(|| UNKNOWN_SLOT.to_string());
        slots.insert(serial.clone(), slot);
    }
    slots
}
