//! Serials a discovery run has to locate.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};
use crate::types::InputStream;

/// Volume and disk-array serials required by a job, each owned by exactly
/// one input stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredSet {
    owners: BTreeMap<String, usize>,
}

impl RequiredSet {
    /// Collect the serials of `streams`.
    ///
    /// A serial claimed twice (by two streams, or twice by one array stream)
    /// cannot be mapped to a single physical location and is rejected.
    pub fn build(streams: &[InputStream]) -> CoreResult<Self> {
        let mut owners = BTreeMap::new();
        for (idx, stream) in streams.iter().enumerate() {
            for serial in stream.serials() {
                if let Some(first) = owners.insert(serial.to_string(), idx) {
                    return Err(CoreError::DuplicateIdentifier {
                        serial: serial.to_string(),
                        first,
                        second: idx,
                    });
                }
            }
        }
        Ok(Self { owners })
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.owners.contains_key(serial)
    }

    /// Index of the stream that requires `serial`.
    pub fn owner(&self, serial: &str) -> Option<usize> {
        self.owners.get(serial).copied()
    }

    pub fn serials(&self) -> BTreeSet<String> {
        self.owners.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
