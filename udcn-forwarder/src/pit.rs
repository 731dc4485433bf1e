//! Pending Interest Table.
//!
//! Entries live in an arena keyed by [`PitId`]. Ids are never reused, so a
//! timer or strategy holding a stale id simply finds nothing.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use log::trace;
use udcn_core::{FaceId, Interest, Name};

use crate::clock::Timestamp;
use crate::scheduler::EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PitId(u64);

impl fmt::Display for PitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pit#{}", self.0)
    }
}

/// Downstream waiting for Data
#[derive(Debug, Clone)]
pub struct InRecord {
    pub face: FaceId,
    /// Last Interest received from this face
    pub interest: Interest,
    pub last_renewed: Timestamp,
    pub expiry: Timestamp,
}

/// Upstream the Interest was forwarded to
#[derive(Debug, Clone)]
pub struct OutRecord {
    pub face: FaceId,
    pub last_nonce: u32,
    pub last_renewed: Timestamp,
    pub expiry: Timestamp,
}

/// Where a nonce has already been seen within one entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateNonce {
    pub in_same: bool,
    pub in_other: bool,
    pub out_same: bool,
    pub out_other: bool,
}

impl DuplicateNonce {
    pub fn is_none(&self) -> bool {
        *self == Self::default()
    }

    /// Seen from this very face before, either as downstream or as upstream.
    /// The same nonce from another face is a second downstream, not a loop.
    pub fn is_loop(&self) -> bool {
        self.in_same || self.out_same
    }

    /// Already carried by this entry on behalf of another face
    pub fn is_duplicate(&self) -> bool {
        !self.is_loop() && (self.in_other || self.out_other)
    }
}

#[derive(Debug)]
pub struct PitEntry {
    id: PitId,
    name: Name,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    /// Set once any downstream asked for fresh Data
    must_be_fresh: bool,
    pub(crate) unsatisfy_timer: Option<EventId>,
    pub(crate) straggler_timer: Option<EventId>,
}

impl PitEntry {
    fn new(id: PitId, name: Name) -> Self {
        Self {
            id,
            name,
            in_records: Vec::new(),
            out_records: Vec::new(),
            must_be_fresh: false,
            unsatisfy_timer: None,
            straggler_timer: None,
        }
    }

    pub fn id(&self) -> PitId {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    pub fn out_records(&self) -> &[OutRecord] {
        &self.out_records
    }

    pub fn in_record(&self, face: FaceId) -> Option<&InRecord> {
        self.in_records.iter().find(|r| r.face == face)
    }

    pub fn out_record(&self, face: FaceId) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }

    /// Insert or refresh the in-record for `face`; a face never has two
    pub(crate) fn insert_or_update_in_record(
        &mut self,
        face: FaceId,
        interest: &Interest,
        now: Timestamp,
        lifetime: Duration,
    ) {
        self.must_be_fresh |= interest.must_be_fresh;
        let record = InRecord {
            face,
            interest: interest.clone(),
            last_renewed: now,
            expiry: now + lifetime,
        };
        match self.in_records.iter_mut().find(|r| r.face == face) {
            Some(existing) => *existing = record,
            None => self.in_records.push(record),
        }
    }

    pub(crate) fn delete_in_record(&mut self, face: FaceId) -> bool {
        let before = self.in_records.len();
        self.in_records.retain(|r| r.face != face);
        before != self.in_records.len()
    }

    pub(crate) fn clear_in_records(&mut self) {
        self.in_records.clear();
    }

    pub(crate) fn insert_or_update_out_record(
        &mut self,
        face: FaceId,
        nonce: u32,
        now: Timestamp,
        lifetime: Duration,
    ) {
        let record = OutRecord {
            face,
            last_nonce: nonce,
            last_renewed: now,
            expiry: now + lifetime,
        };
        match self.out_records.iter_mut().find(|r| r.face == face) {
            Some(existing) => *existing = record,
            None => self.out_records.push(record),
        }
    }

    pub(crate) fn delete_out_record(&mut self, face: FaceId) -> bool {
        let before = self.out_records.len();
        self.out_records.retain(|r| r.face != face);
        before != self.out_records.len()
    }

    pub fn has_unexpired_in_records(&self, now: Timestamp) -> bool {
        self.in_records.iter().any(|r| r.expiry > now)
    }

    pub fn has_unexpired_out_records(&self, now: Timestamp) -> bool {
        self.out_records.iter().any(|r| r.expiry > now)
    }

    /// Latest expiry among the in-records
    pub fn last_in_record_expiry(&self) -> Option<Timestamp> {
        self.in_records.iter().map(|r| r.expiry).max()
    }

    /// Classify where `nonce` was already seen, relative to `face`
    pub fn find_nonce(&self, nonce: u32, face: FaceId) -> DuplicateNonce {
        let mut dup = DuplicateNonce::default();
        for record in self.in_records.iter().filter(|r| r.interest.nonce == nonce) {
            if record.face == face {
                dup.in_same = true;
            } else {
                dup.in_other = true;
            }
        }
        for record in self.out_records.iter().filter(|r| r.last_nonce == nonce) {
            if record.face == face {
                dup.out_same = true;
            } else {
                dup.out_other = true;
            }
        }
        dup
    }

    /// Whether any downstream ever asked for fresh Data, including
    /// downstreams whose in-records are already gone
    pub fn must_be_fresh(&self) -> bool {
        self.must_be_fresh
    }
}

#[derive(Debug, Default)]
pub struct Pit {
    entries: HashMap<PitId, PitEntry>,
    by_name: HashMap<Name, PitId>,
    next_id: u64,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the entry for `name`. The flag is true if it was created.
    pub fn insert(&mut self, name: &Name) -> (PitId, bool) {
        if let Some(&id) = self.by_name.get(name) {
            return (id, false);
        }
        self.next_id += 1;
        let id = PitId(self.next_id);
        trace!("PIT insert {} {}", id, name);
        self.entries.insert(id, PitEntry::new(id, name.clone()));
        self.by_name.insert(name.clone(), id);
        (id, true)
    }

    pub fn find(&self, name: &Name) -> Option<PitId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: PitId) -> Option<&PitEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PitId) -> Option<&mut PitEntry> {
        self.entries.get_mut(&id)
    }

    pub fn erase(&mut self, id: PitId) -> Option<PitEntry> {
        let entry = self.entries.remove(&id)?;
        self.by_name.remove(&entry.name);
        trace!("PIT erase {} {}", id, entry.name);
        Some(entry)
    }

    /// Entries whose name is a prefix of `data_name`, longest first
    pub fn find_all_data_matches(&self, data_name: &Name) -> Vec<PitId> {
        data_name
            .prefixes()
            .filter_map(|prefix| self.by_name.get(&prefix).copied())
            .collect()
    }

    pub fn ids(&self) -> Vec<PitId> {
        let mut ids: Vec<PitId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
