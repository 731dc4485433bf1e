//! Dead nonce list: (Name, Nonce) pairs of Interests that are no longer
//! pending, kept for a bounded lifetime so that late loops are still caught.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use log::trace;
use udcn_core::Name;

use crate::clock::Timestamp;

/// Default retention window
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(6);

/// Default maximum number of tracked pairs
pub const DEFAULT_CAPACITY: usize = 1 << 16;

#[derive(Debug)]
pub struct DeadNonceList {
    lifetime: Duration,
    capacity: usize,
    /// Latest insertion time per pair
    entries: HashMap<(Name, u32), Timestamp>,
    /// Insertion log, oldest first. A pair re-added later appears twice; only
    /// the record matching `entries` is authoritative.
    queue: VecDeque<(Name, u32, Timestamp)>,
}

impl DeadNonceList {
    pub fn new(lifetime: Duration, capacity: usize) -> Self {
        Self {
            lifetime,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Check whether the pair was recorded within the retention window
    pub fn has(&self, name: &Name, nonce: u32) -> bool {
        self.entries.contains_key(&(name.clone(), nonce))
    }

    /// Record a pair, refreshing its insertion time if already present
    pub fn add(&mut self, name: &Name, nonce: u32, now: Timestamp) {
        self.evict_expired(now);
        trace!("dead nonce list add name={} nonce={:08x}", name, nonce);
        self.entries.insert((name.clone(), nonce), now);
        self.queue.push_back((name.clone(), nonce, now));
        while self.entries.len() > self.capacity {
            if !self.pop_oldest() {
                break;
            }
        }
    }

    /// Drop every pair older than the lifetime. Returns how many were evicted.
    pub fn evict_expired(&mut self, now: Timestamp) -> usize {
        let mut evicted = 0;
        while let Some((_, _, inserted)) = self.queue.front() {
            if *inserted + self.lifetime > now {
                break;
            }
            if self.pop_oldest() {
                evicted += 1;
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pop the front of the log; true if it removed a live pair
    fn pop_oldest(&mut self) -> bool {
        let Some((name, nonce, inserted)) = self.queue.pop_front() else {
            return false;
        };
        let key = (name, nonce);
        if self.entries.get(&key) == Some(&inserted) {
            self.entries.remove(&key);
            true
        } else {
            false
        }
    }
}

impl Default for DeadNonceList {
    fn default() -> Self {
        Self::new(DEFAULT_LIFETIME, DEFAULT_CAPACITY)
    }
}
