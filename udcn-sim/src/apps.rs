use std::collections::HashMap;
use std::time::Duration;

use log::{debug, trace};
use serde::Serialize;
use udcn_core::{Data, FaceId, Interest, Name};
use udcn_forwarder::{FaceOutbox, Timestamp};

/// Application issuing `/<prefix>/<seq>` Interests at a fixed rate
pub struct Consumer {
    pub node: usize,
    pub face: FaceId,
    pub outbox: FaceOutbox,
    prefix: Name,
    interval: Duration,
    lifetime: Duration,
    must_be_fresh: bool,
    start: Timestamp,
    next_seq: u64,
    /// Sent and not yet answered, by name
    pending: HashMap<Name, Timestamp>,
    stats: ConsumerStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsumerStats {
    pub sent: u64,
    pub satisfied: u64,
    pub timed_out: u64,
    #[serde(skip)]
    total_rtt: Duration,
}

impl ConsumerStats {
    pub fn average_rtt(&self) -> Option<Duration> {
        if self.satisfied == 0 {
            return None;
        }
        u32::try_from(self.satisfied)
            .ok()
            .map(|count| self.total_rtt / count)
    }
}

impl Consumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: usize,
        face: FaceId,
        outbox: FaceOutbox,
        prefix: Name,
        interval: Duration,
        lifetime: Duration,
        must_be_fresh: bool,
        start: Timestamp,
    ) -> Self {
        Self {
            node,
            face,
            outbox,
            prefix,
            interval,
            lifetime,
            must_be_fresh,
            start,
            next_seq: 0,
            pending: HashMap::new(),
            stats: ConsumerStats::default(),
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    /// Build the next Interest in the sequence and remember when it left
    pub fn next_interest(&mut self, now: Timestamp) -> Interest {
        let name = self.prefix.clone().with_sequence(self.next_seq);
        self.next_seq += 1;
        self.pending.insert(name.clone(), now);
        self.stats.sent += 1;
        trace!("consumer {} sends {}", self.prefix, name);
        Interest::new(name)
            .with_lifetime(self.lifetime)
            .with_must_be_fresh(self.must_be_fresh)
    }

    pub fn on_data(&mut self, data: &Data, now: Timestamp) {
        match self.pending.remove(&data.name) {
            Some(sent_at) => {
                self.stats.satisfied += 1;
                self.stats.total_rtt += now.saturating_duration_since(sent_at);
            }
            None => debug!("consumer {} got unexpected {}", self.prefix, data.name),
        }
    }

    /// Give up on Interests whose lifetime has passed
    pub fn expire(&mut self, now: Timestamp) {
        let lifetime = self.lifetime;
        let before = self.pending.len();
        self.pending.retain(|_, sent_at| *sent_at + lifetime > now);
        self.stats.timed_out += (before - self.pending.len()) as u64;
    }
}

/// Application answering every Interest under its prefix
pub struct Producer {
    pub node: usize,
    pub face: FaceId,
    pub outbox: FaceOutbox,
    prefix: Name,
    payload_size: usize,
    freshness: Option<Duration>,
    served: u64,
}

impl Producer {
    pub fn new(
        node: usize,
        face: FaceId,
        outbox: FaceOutbox,
        prefix: Name,
        payload_size: usize,
        freshness: Option<Duration>,
    ) -> Self {
        Self {
            node,
            face,
            outbox,
            prefix,
            payload_size,
            freshness,
            served: 0,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn respond(&mut self, interest: &Interest) -> Option<Data> {
        if !self.prefix.is_prefix_of(&interest.name) {
            return None;
        }
        self.served += 1;
        let data = Data::new(interest.name.clone(), vec![0u8; self.payload_size]);
        Some(match self.freshness {
            Some(freshness) => data.with_freshness_period(freshness),
            None => data,
        })
    }
}
