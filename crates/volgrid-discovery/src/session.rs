//! Discovery session — reconciles status records against the required set.
//!
//! One session lives for exactly one discovery run. It owns every piece
//! of mutable run state (still-missing serials, conflicts, not-ready and
//! incomplete lists) and classifies each record the moment it arrives, so
//! the first record to claim a serial wins and later claims never undo it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};
use volgrid_core::RequiredSet;

use crate::record::{NO_VOLUME, StatusPayload, StatusRecord};

/// Two required volumes reported in the two banks of one recorder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Conflict {
    pub host: String,
    pub bank_a: String,
    pub bank_b: String,
}

/// What [`DiscoverySession::absorb`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorbed {
    /// Undecodable or not a status message.
    Unknown,
    /// The origin host already answered during this run.
    DuplicateHost,
    /// Accepted, but it located no still-missing serial.
    Irrelevant,
    /// Accepted and located this many serials.
    Located(usize),
}

/// Aggregate result of one discovery run. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryOutcome {
    /// Records that located at least one required serial, by origin host.
    pub resolved: Vec<StatusRecord>,
    pub conflicts: Vec<Conflict>,
    pub missing: Vec<String>,
    pub not_ready: Vec<String>,
    pub incomplete: Vec<String>,
    /// Required serial → index into `resolved` of the record that located it.
    #[serde(skip)]
    locations: BTreeMap<String, usize>,
}

impl DiscoveryOutcome {
    /// `true` when nothing blocks the job: no conflicts, missing, not-ready
    /// or incomplete serials.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
            && self.missing.is_empty()
            && self.not_ready.is_empty()
            && self.incomplete.is_empty()
    }

    /// The record that first located `serial`.
    pub fn location_of(&self, serial: &str) -> Option<&StatusRecord> {
        self.locations.get(serial).map(|&idx| &self.resolved[idx])
    }
}

/// Mutable state of one discovery run.
#[derive(Debug)]
pub struct DiscoverySession {
    missing: BTreeSet<String>,
    seen_hosts: HashSet<String>,
    resolved: Vec<StatusRecord>,
    located: BTreeMap<String, usize>,
    conflicts: Vec<Conflict>,
    not_ready: Vec<String>,
    incomplete: Vec<String>,
}

impl DiscoverySession {
    pub fn new(required: &RequiredSet) -> Self {
        Self {
            missing: required.serials(),
            seen_hosts: HashSet::new(),
            resolved: Vec::new(),
            located: BTreeMap::new(),
            conflicts: Vec::new(),
            not_ready: Vec::new(),
            incomplete: Vec::new(),
        }
    }

    /// Every required serial has been located.
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// Classify one record.
    pub fn absorb(&mut self, record: StatusRecord) -> Absorbed {
        if record.is_unknown() {
            return Absorbed::Unknown;
        }
        if !self.seen_hosts.insert(record.origin_host.clone()) {
            debug!(host = %record.origin_host, "ignoring repeated response");
            return Absorbed::DuplicateHost;
        }

        let index = self.resolved.len();
        let located = match &record.payload {
            StatusPayload::Module { bank_a, bank_b } => self.absorb_module(&record, bank_a, bank_b, index),
            StatusPayload::DiskArray { .. } => self.absorb_array(&record, index),
            StatusPayload::Unknown => 0,
        };

        if located == 0 {
            debug!(host = %record.origin_host, "response holds no missing serial");
            return Absorbed::Irrelevant;
        }
        info!(
            host = %record.origin_host,
            located,
            remaining = self.missing.len(),
            "located required serials"
        );
        self.resolved.push(record);
        Absorbed::Located(located)
    }

    fn absorb_module(&mut self, record: &StatusRecord, bank_a: &str, bank_b: &str, index: usize) -> usize {
        let a_missing = bank_a != NO_VOLUME && self.missing.contains(bank_a);
        let b_missing = bank_b != NO_VOLUME && bank_b != bank_a && self.missing.contains(bank_b);

        if a_missing && b_missing {
            warn!(
                host = %record.origin_host,
                bank_a,
                bank_b,
                "two required volumes reported in one recorder"
            );
            self.conflicts.push(Conflict {
                host: record.origin_host.clone(),
                bank_a: bank_a.to_string(),
                bank_b: bank_b.to_string(),
            });
        }

        let mut located = 0;
        for (volume, was_missing) in [(bank_a, a_missing), (bank_b, b_missing)] {
            if !was_missing {
                continue;
            }
            self.missing.remove(volume);
            self.located.insert(volume.to_string(), index);
            located += 1;
            if !record.is_ready() {
                warn!(host = %record.origin_host, volume, state = %record.state, "module not ready");
                self.not_ready.push(volume.to_string());
            }
        }
        located
    }

    fn absorb_array(&mut self, record: &StatusRecord, index: usize) -> usize {
        let mut located = 0;
        for (slot, serial) in record.slots() {
            if !self.missing.remove(serial) {
                continue;
            }
            self.located.insert(serial.to_string(), index);
            located += 1;
            if !record.slot_complete(slot) {
                warn!(host = %record.origin_host, slot, serial, "disk array module incomplete");
                self.incomplete.push(serial.to_string());
            }
        }
        located
    }

    /// Close the run and produce the sorted outcome.
    pub fn finish(self) -> DiscoveryOutcome {
        let mut order: Vec<usize> = (0..self.resolved.len()).collect();
        order.sort_by(|&a, &b| self.resolved[a].cmp(&self.resolved[b]));

        // Old index → position after sorting.
        let mut remap = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = new;
        }

        let mut resolved: Vec<Option<StatusRecord>> = self.resolved.into_iter().map(Some).collect();
        let resolved_sorted = order
            .iter()
            .filter_map(|&old| resolved[old].take())
            .collect();

        let locations = self
            .located
            .into_iter()
            .map(|(serial, old)| (serial, remap[old]))
            .collect();

        let mut conflicts = self.conflicts;
        let mut not_ready = self.not_ready;
        let mut incomplete = self.incomplete;
        conflicts.sort();
        not_ready.sort();
        incomplete.sort();

        DiscoveryOutcome {
            resolved: resolved_sorted,
            conflicts,
            missing: self.missing.into_iter().collect(),
            not_ready,
            incomplete,
            locations,
        }
    }
}
