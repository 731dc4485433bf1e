use serde::Serialize;

/// Packet and decision counters of one forwarder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwarderCounters {
    pub in_interests: u64,
    pub out_interests: u64,
    pub in_data: u64,
    pub out_data: u64,
    pub interest_loops: u64,
    /// Known nonce from another downstream, recorded without forwarding
    pub duplicate_nonces: u64,
    /// Interests addressed to another receiver on the link
    pub foreign_target_drops: u64,
    pub cs_hits: u64,
    pub cs_misses: u64,
    pub satisfied_interests: u64,
    pub unsatisfied_interests: u64,
    pub rejected_interests: u64,
    pub unsolicited_data: u64,
    pub scope_violations: u64,
    pub invalid_face_sends: u64,
    pub strategy_violations: u64,
}

impl ForwarderCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of cache lookups that hit
    pub fn cs_hit_ratio(&self) -> f64 {
        let lookups = self.cs_hits + self.cs_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cs_hits as f64 / lookups as f64
        }
    }

    /// Add every counter of `other` into `self`
    pub fn merge(&mut self, other: &ForwarderCounters) {
        self.in_interests += other.in_interests;
        self.out_interests += other.out_interests;
        self.in_data += other.in_data;
        self.out_data += other.out_data;
        self.interest_loops += other.interest_loops;
        self.duplicate_nonces += other.duplicate_nonces;
        self.foreign_target_drops += other.foreign_target_drops;
        self.cs_hits += other.cs_hits;
        self.cs_misses += other.cs_misses;
        self.satisfied_interests += other.satisfied_interests;
        self.unsatisfied_interests += other.unsatisfied_interests;
        self.rejected_interests += other.rejected_interests;
        self.unsolicited_data += other.unsolicited_data;
        self.scope_violations += other.scope_violations;
        self.invalid_face_sends += other.invalid_face_sends;
        self.strategy_violations += other.strategy_violations;
    }
}
