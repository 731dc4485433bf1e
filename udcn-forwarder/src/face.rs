use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use log::{debug, info};
use udcn_core::{Data, FaceId, Interest, Packet};

use crate::error::ForwarderError;

/// First id handed out by [`FaceTable::add`]
pub const FIRST_DYNAMIC_FACE_ID: u32 = FaceId::RESERVED_MAX.0 + 1;

/// Abstract bidirectional packet endpoint.
///
/// The forwarder hands already-decoded packets to the face; framing and
/// delivery belong to the implementation.
pub trait Face {
    /// Local faces (applications on this host) may carry `/localhost` traffic
    fn is_local(&self) -> bool;

    fn send_interest(&mut self, interest: Interest);

    fn send_data(&mut self, data: Data);

    /// Link-layer address of this end. Interests carrying a different
    /// target hint are not for us; faces without an address accept all.
    fn address(&self) -> Option<&str> {
        None
    }

    fn describe(&self) -> String {
        if self.is_local() {
            "local".to_string()
        } else {
            "remote".to_string()
        }
    }
}

/// Faces owned by one forwarder, keyed by id.
///
/// PIT and FIB records only keep the [`FaceId`]; removing a face here is
/// enough to make every later send towards it a no-op.
pub struct FaceTable {
    faces: BTreeMap<FaceId, Box<dyn Face>>,
    next_id: u32,
}

impl FaceTable {
    pub fn new() -> Self {
        Self {
            faces: BTreeMap::new(),
            next_id: FIRST_DYNAMIC_FACE_ID,
        }
    }

    /// Add a face and return its newly allocated id
    pub fn add(&mut self, face: Box<dyn Face>) -> FaceId {
        let id = FaceId(self.next_id);
        self.next_id += 1;
        info!("Added face {} ({})", id, face.describe());
        self.faces.insert(id, face);
        id
    }

    /// Add a face under one of the reserved ids
    pub fn add_reserved(&mut self, id: FaceId, face: Box<dyn Face>) -> Result<(), ForwarderError> {
        if !id.is_reserved() {
            return Err(ForwarderError::ReservedFaceId(id));
        }
        if self.faces.contains_key(&id) {
            return Err(ForwarderError::FaceAlreadyExists(id));
        }
        info!("Added reserved face {} ({})", id, face.describe());
        self.faces.insert(id, face);
        Ok(())
    }

    pub fn remove(&mut self, id: FaceId) -> Option<Box<dyn Face>> {
        let face = self.faces.remove(&id);
        if face.is_some() {
            debug!("Removed face {}", id);
        }
        face
    }

    pub fn contains(&self, id: FaceId) -> bool {
        self.faces.contains_key(&id)
    }

    /// Unknown faces are treated as non-local
    pub fn is_local(&self, id: FaceId) -> bool {
        self.faces.get(&id).is_some_and(|face| face.is_local())
    }

    pub fn address(&self, id: FaceId) -> Option<&str> {
        self.faces.get(&id).and_then(|face| face.address())
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut (dyn Face + 'static)> {
        self.faces.get_mut(&id).map(|face| face.as_mut())
    }

    pub fn ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Face that queues everything the forwarder sends for the host to collect
pub struct MemoryFace {
    local: bool,
    label: String,
    address: Option<String>,
    outbox: FaceOutbox,
}

impl MemoryFace {
    /// Create the face together with the handle used to drain it
    pub fn new(label: impl Into<String>, local: bool) -> (Self, FaceOutbox) {
        let outbox = FaceOutbox::default();
        let face = Self {
            local,
            label: label.into(),
            address: None,
            outbox: outbox.clone(),
        };
        (face, outbox)
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

impl Face for MemoryFace {
    fn is_local(&self) -> bool {
        self.local
    }

    fn send_interest(&mut self, interest: Interest) {
        self.outbox.push(Packet::Interest(interest));
    }

    fn send_data(&mut self, data: Data) {
        self.outbox.push(Packet::Data(data));
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn describe(&self) -> String {
        format!("memory:{}{}", self.label, if self.local { " local" } else { "" })
    }
}

/// Shared queue of packets sent out of a [`MemoryFace`]
#[derive(Clone, Default)]
pub struct FaceOutbox {
    queue: Rc<RefCell<VecDeque<Packet>>>,
}

impl FaceOutbox {
    fn push(&self, packet: Packet) {
        self.queue.borrow_mut().push_back(packet);
    }

    pub fn drain(&self) -> Vec<Packet> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Drain only the Interests, keeping any Data queued
    pub fn take_interests(&self) -> Vec<Interest> {
        let mut queue = self.queue.borrow_mut();
        let mut interests = Vec::new();
        queue.retain(|packet| match packet {
            Packet::Interest(interest) => {
                interests.push(interest.clone());
                false
            }
            Packet::Data(_) => true,
        });
        interests
    }

    /// Drain only the Data, keeping any Interests queued
    pub fn take_data(&self) -> Vec<Data> {
        let mut queue = self.queue.borrow_mut();
        let mut data = Vec::new();
        queue.retain(|packet| match packet {
            Packet::Data(d) => {
                data.push(d.clone());
                false
            }
            Packet::Interest(_) => true,
        });
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udcn_core::Name;

    #[test]
    fn test_dynamic_ids_start_after_reserved_range() {
        let mut table = FaceTable::new();
        let (face, _) = MemoryFace::new("a", false);
        let id = table.add(Box::new(face));
        assert_eq!(id, FaceId(FIRST_DYNAMIC_FACE_ID));
        assert!(!id.is_reserved());
        assert!(table.contains(id));
    }

    #[test]
    fn test_add_reserved_rejects_dynamic_and_duplicate_ids() {
        let mut table = FaceTable::new();
        let (a, _) = MemoryFace::new("cs", true);
        let (b, _) = MemoryFace::new("cs2", true);
        let (c, _) = MemoryFace::new("bad", true);
        table.add_reserved(FaceId::CONTENT_STORE, Box::new(a)).unwrap();
        assert!(matches!(
            table.add_reserved(FaceId::CONTENT_STORE, Box::new(b)),
            Err(ForwarderError::FaceAlreadyExists(_))
        ));
        assert!(matches!(
            table.add_reserved(FaceId(300), Box::new(c)),
            Err(ForwarderError::ReservedFaceId(_))
        ));
    }

    #[test]
    fn test_locality_of_unknown_face() {
        let mut table = FaceTable::new();
        let (face, _) = MemoryFace::new("app", true);
        let id = table.add(Box::new(face));
        assert!(table.is_local(id));
        table.remove(id);
        assert!(!table.is_local(id));
    }

    #[test]
    fn test_address_lookup() {
        let mut table = FaceTable::new();
        let (wifi, _) = MemoryFace::new("wifi", false);
        let (app, _) = MemoryFace::new("app", true);
        let wifi = table.add(Box::new(wifi.with_address("00:00:00:00:00:03")));
        let app = table.add(Box::new(app));
        assert_eq!(table.address(wifi), Some("00:00:00:00:00:03"));
        assert_eq!(table.address(app), None);
        assert_eq!(table.address(FaceId(999)), None);
    }

    #[test]
    fn test_outbox_split_by_kind() {
        let (mut face, outbox) = MemoryFace::new("x", false);
        let name = Name::from_str("/a").unwrap();
        face.send_interest(Interest::new(name.clone()));
        face.send_data(Data::new(name, Vec::new()));
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox.take_interests().len(), 1);
        assert_eq!(outbox.take_data().len(), 1);
        assert!(outbox.is_empty());
    }
}
