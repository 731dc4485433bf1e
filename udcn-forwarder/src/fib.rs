use std::collections::BTreeMap;
use std::time::Duration;

use log::{debug, info};
use udcn_core::{FaceId, Name};

/// Next hop information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    /// Face the Interest is sent through
    pub face: FaceId,
    /// Routing cost; lower is preferred
    pub cost: u32,
    /// Link-layer address hint for multi-access faces
    pub target_hint: Option<String>,
    /// Measured latency, used to order next hops of equal cost
    pub latency: Option<Duration>,
}

impl NextHop {
    pub fn new(face: FaceId, cost: u32) -> Self {
        Self {
            face,
            cost,
            target_hint: None,
            latency: None,
        }
    }

    fn sort_key(&self) -> (u32, Duration, FaceId) {
        (self.cost, self.latency.unwrap_or(Duration::MAX), self.face)
    }
}

/// FIB entry containing next hop information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibEntry {
    /// Name prefix this entry covers
    pub prefix: Name,
    /// Next hops in ascending cost order
    pub next_hops: Vec<NextHop>,
}

impl FibEntry {
    fn new(prefix: Name) -> Self {
        Self {
            prefix,
            next_hops: Vec::new(),
        }
    }

    pub fn has_next_hop(&self, face: FaceId) -> bool {
        self.next_hops.iter().any(|nh| nh.face == face)
    }

    fn sort(&mut self) {
        self.next_hops.sort_by_key(NextHop::sort_key);
    }
}

/// Forwarding Information Base.
///
/// Populated by the host (static routes, a routing daemon); the pipeline only
/// reads it, apart from the soft cost bump strategies may request.
#[derive(Debug, Default)]
pub struct Fib {
    entries: BTreeMap<Name, FibEntry>,
}

impl Fib {
    /// Create an empty FIB
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a next hop under `prefix`
    pub fn add_next_hop(&mut self, prefix: &Name, next_hop: NextHop) {
        let entry = self
            .entries
            .entry(prefix.clone())
            .or_insert_with(|| FibEntry::new(prefix.clone()));
        match entry.next_hops.iter_mut().find(|nh| nh.face == next_hop.face) {
            Some(existing) => *existing = next_hop,
            None => {
                info!("Added FIB next hop {} -> face {}", prefix, next_hop.face);
                entry.next_hops.push(next_hop);
            }
        }
        entry.sort();
    }

    /// Remove a next hop; the entry goes away with its last next hop
    pub fn remove_next_hop(&mut self, prefix: &Name, face: FaceId) -> bool {
        let Some(entry) = self.entries.get_mut(prefix) else {
            return false;
        };
        let before = entry.next_hops.len();
        entry.next_hops.retain(|nh| nh.face != face);
        let removed = entry.next_hops.len() != before;
        if entry.next_hops.is_empty() {
            self.entries.remove(prefix);
            info!("Removed FIB entry for prefix: {}", prefix);
        }
        removed
    }

    /// Drop every next hop through `face`. Returns how many were removed.
    pub fn remove_face(&mut self, face: FaceId) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let before = entry.next_hops.len();
            entry.next_hops.retain(|nh| nh.face != face);
            removed += before - entry.next_hops.len();
            !entry.next_hops.is_empty()
        });
        if removed > 0 {
            debug!("Removed {} FIB next hops through face {}", removed, face);
        }
        removed
    }

    pub fn find_exact_match(&self, prefix: &Name) -> Option<&FibEntry> {
        self.entries.get(prefix)
    }

    /// Longest-prefix match. Falls back to an empty root entry so callers
    /// always get something to hand to a strategy.
    pub fn find_longest_prefix_match(&self, name: &Name) -> FibEntry {
        for prefix in name.prefixes() {
            if let Some(entry) = self.entries.get(&prefix) {
                debug!(
                    "FIB lookup for {}: matched {} with {} next hops",
                    name,
                    entry.prefix,
                    entry.next_hops.len()
                );
                return entry.clone();
            }
        }
        debug!("FIB lookup for {}: no route found", name);
        FibEntry::new(Name::new())
    }

    /// Raise the cost of `face` under the longest prefix of `name` that routes
    /// through it. Saturates instead of overflowing.
    pub fn bump_cost(&mut self, name: &Name, face: FaceId, delta: u32) -> bool {
        for prefix in name.prefixes() {
            if let Some(entry) = self.entries.get_mut(&prefix) {
                if let Some(next_hop) = entry.next_hops.iter_mut().find(|nh| nh.face == face) {
                    next_hop.cost = next_hop.cost.saturating_add(delta);
                    entry.sort();
                    return true;
                }
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FibEntry> {
        self.entries.values()
    }
}
