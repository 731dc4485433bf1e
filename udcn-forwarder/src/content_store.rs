use std::collections::BTreeMap;
use std::ops::Bound;

use log::debug;
use udcn_core::{Data, Interest, Name};

use crate::clock::Timestamp;

/// Cache consulted before an Interest is forwarded upstream
pub trait ContentStore {
    /// Find Data satisfying `interest`, honouring `must_be_fresh`
    fn find(&mut self, interest: &Interest, now: Timestamp) -> Option<Data>;

    /// Cache `data`. Returns false if the store declined it.
    fn insert(&mut self, data: &Data, is_unsolicited: bool, now: Timestamp) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct CachedData {
    data: Data,
    /// Absent when the Data carries no freshness period: stale on arrival
    fresh_until: Option<Timestamp>,
    unsolicited: bool,
    seq: u64,
}

impl CachedData {
    fn is_fresh(&self, now: Timestamp) -> bool {
        self.fresh_until.is_some_and(|until| until > now)
    }
}

/// In-memory content store with a fixed capacity.
///
/// When full, unsolicited Data goes first, then the oldest insertion.
#[derive(Debug)]
pub struct MemoryContentStore {
    capacity: usize,
    entries: BTreeMap<Name, CachedData>,
    next_seq: u64,
}

impl MemoryContentStore {
    /// A capacity of 0 disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, cached)| (!cached.unsolicited, cached.seq))
            .map(|(name, _)| name.clone());
        if let Some(name) = victim {
            debug!("Content store evicting {}", name);
            self.entries.remove(&name);
        }
    }
}

impl ContentStore for MemoryContentStore {
    fn find(&mut self, interest: &Interest, now: Timestamp) -> Option<Data> {
        let range = self
            .entries
            .range((Bound::Included(&interest.name), Bound::Unbounded));
        for (name, cached) in range {
            // Names extending the Interest name sort directly after it
            if !interest.name.is_prefix_of(name) {
                break;
            }
            if interest.must_be_fresh && !cached.is_fresh(now) {
                continue;
            }
            return Some(cached.data.clone());
        }
        None
    }

    fn insert(&mut self, data: &Data, is_unsolicited: bool, now: Timestamp) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.next_seq += 1;
        let cached = CachedData {
            data: data.clone(),
            fresh_until: data.freshness_period.map(|period| now + period),
            unsolicited: is_unsolicited,
            seq: self.next_seq,
        };
        if self.entries.insert(data.name.clone(), cached).is_none() {
            while self.entries.len() > self.capacity {
                self.evict_one();
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn name(uri: &str) -> Name {
        Name::from_str(uri).unwrap()
    }

    fn data(uri: &str, freshness_ms: Option<u64>) -> Data {
        let data = Data::new(name(uri), b"payload".to_vec());
        match freshness_ms {
            Some(ms) => data.with_freshness_period(Duration::from_millis(ms)),
            None => data,
        }
    }

    #[test]
    fn test_prefix_match() {
        let mut cs = MemoryContentStore::new(10);
        cs.insert(&data("/a/b/1", None), false, Timestamp::ZERO);
        cs.insert(&data("/ab", None), false, Timestamp::ZERO);

        let hit = cs.find(&Interest::new(name("/a/b")), Timestamp::ZERO).unwrap();
        assert_eq!(hit.name, name("/a/b/1"));
        assert!(cs.find(&Interest::new(name("/a/c")), Timestamp::ZERO).is_none());
    }

    #[test]
    fn test_must_be_fresh() {
        let mut cs = MemoryContentStore::new(10);
        cs.insert(&data("/a/1", Some(100)), false, Timestamp::ZERO);
        cs.insert(&data("/b/1", None), false, Timestamp::ZERO);

        let fresh = Interest::new(name("/a")).with_must_be_fresh(true);
        assert!(cs.find(&fresh, Timestamp::from_millis(99)).is_some());
        assert!(cs.find(&fresh, Timestamp::from_millis(100)).is_none());
        assert!(cs.find(&Interest::new(name("/a")), Timestamp::from_millis(500)).is_some());

        let fresh_b = Interest::new(name("/b")).with_must_be_fresh(true);
        assert!(cs.find(&fresh_b, Timestamp::ZERO).is_none());
    }

    #[test]
    fn test_eviction_prefers_unsolicited_then_oldest() {
        let mut cs = MemoryContentStore::new(2);
        cs.insert(&data("/a", None), false, Timestamp::ZERO);
        cs.insert(&data("/b", None), true, Timestamp::ZERO);
        cs.insert(&data("/c", None), false, Timestamp::ZERO);
        assert_eq!(cs.len(), 2);
        assert!(cs.find(&Interest::new(name("/b")), Timestamp::ZERO).is_none());

        cs.insert(&data("/d", None), false, Timestamp::ZERO);
        assert!(cs.find(&Interest::new(name("/a")), Timestamp::ZERO).is_none());
        assert!(cs.find(&Interest::new(name("/c")), Timestamp::ZERO).is_some());
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let mut cs = MemoryContentStore::new(0);
        assert!(!cs.insert(&data("/a", None), false, Timestamp::ZERO));
        assert!(cs.is_empty());
    }
}
