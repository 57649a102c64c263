//! Decoded status messages.

use std::collections::BTreeMap;

use serde::Serialize;

/// Bank value used when a module bank is empty or reports a malformed serial.
pub const NO_VOLUME: &str = "none";

/// One decoded status response.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StatusRecord {
    /// Short hostname the datagram came from.
    pub origin_host: String,
    /// Unit name the sender reports for itself, lower-cased. Empty when absent.
    pub unit: String,
    /// Free-text recorder state, `"Unknown"` when the message carries none.
    pub state: String,
    pub payload: StatusPayload,
}

/// Per-class body of a status record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusPayload {
    /// Removable module recorder with two banks.
    Module { bank_a: String, bank_b: String },
    /// Disk-array recorder; every leaf field of the status element, verbatim.
    DiskArray { slot_fields: BTreeMap<String, String> },
    /// Not a status message, or not decodable.
    Unknown,
}

impl StatusRecord {
    pub fn unknown(origin_host: &str) -> Self {
        StatusRecord {
            origin_host: origin_host.to_string(),
            unit: String::new(),
            state: "Unknown".to_string(),
            payload: StatusPayload::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.payload, StatusPayload::Unknown)
    }

    /// Recorder is idle or closed, i.e. the module may be used by a job.
    pub fn is_ready(&self) -> bool {
        self.state == "Idle" || self.state == "Close"
    }

    /// `(slot, serial)` pairs of a disk-array record, ordered by slot number.
    pub fn slots(&self) -> Vec<(u32, &str)> {
        let StatusPayload::DiskArray { slot_fields } = &self.payload else {
            return Vec::new();
        };
        let mut slots: Vec<(u32, &str)> = slot_fields
            .iter()
            .filter_map(|(key, value)| {
                let slot = key.strip_prefix("slot")?.strip_suffix("MSN")?;
                Some((slot.parse().ok()?, value.as_str()))
            })
            .collect();
        slots.sort();
        slots
    }

    /// A slot is complete when it reports at least one disk and no missing disks.
    pub fn slot_complete(&self, slot: u32) -> bool {
        let StatusPayload::DiskArray { slot_fields } = &self.payload else {
            return false;
        };
        let disks = slot_fields
            .get(&format!("slot{slot}Disks"))
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);
        let missing = match slot_fields.get(&format!("slot{slot}MissingDisks")) {
            None => 0,
            Some(v) => v.trim().parse::<u32>().unwrap_or(u32::MAX),
        };
        disks > 0 && missing == 0
    }

    /// Whether this record reports `serial` in a bank or array slot.
    pub fn holds(&self, serial: &str) -> bool {
        if serial == NO_VOLUME {
            return false;
        }
        match &self.payload {
            StatusPayload::Module { bank_a, bank_b } => bank_a == serial || bank_b == serial,
            StatusPayload::DiskArray { .. } => self.slots().iter().any(|(_, s)| *s == serial),
            StatusPayload::Unknown => false,
        }
    }
}
