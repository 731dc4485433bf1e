use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::Duration;

use crate::clock::Timestamp;

/// Handle of a scheduled event. Ids are never reused, so a stale handle can
/// only ever refer to an event that already fired or was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Single-threaded timer queue driven by a virtual clock.
///
/// Events fire in deadline order; events sharing a deadline fire in the order
/// they were scheduled.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Timestamp,
    next_id: u64,
    queue: BinaryHeap<Reverse<(Timestamp, EventId)>>,
    pending: HashMap<EventId, T>,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Timestamp::ZERO,
            next_id: 1,
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Schedule `payload` to fire `delay` after the current time
    pub fn schedule(&mut self, delay: Duration, payload: T) -> EventId {
        self.schedule_at(self.now + delay, payload)
    }

    /// Schedule `payload` at an absolute time; past deadlines fire on the next poll
    pub fn schedule_at(&mut self, at: Timestamp, payload: T) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.queue.push(Reverse((at.max(self.now), id)));
        self.pending.insert(id, payload);
        id
    }

    /// Cancel an event. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let cancelled = self.pending.remove(&id).is_some();
        self.discard_cancelled_head();
        cancelled
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Deadline of the earliest live event
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.peek().map(|Reverse((at, _))| *at)
    }

    /// Pop the earliest live event due at or before `until`, moving the clock
    /// to its deadline.
    pub fn pop_due(&mut self, until: Timestamp) -> Option<(EventId, T)> {
        self.discard_cancelled_head();
        match self.queue.peek() {
            Some(Reverse((at, _))) if *at <= until => {}
            _ => return None,
        }
        let Reverse((at, id)) = self.queue.pop()?;
        let payload = self.pending.remove(&id)?;
        self.discard_cancelled_head();
        self.now = self.now.max(at);
        Some((id, payload))
    }

    /// Move the clock forward without firing anything. The clock never goes back.
    pub fn advance_to(&mut self, now: Timestamp) {
        self.now = self.now.max(now);
    }

    // Keeps the heap head live so `next_deadline` can peek without mutating
    fn discard_cancelled_head(&mut self) {
        while let Some(Reverse((_, id))) = self.queue.peek() {
            if self.pending.contains_key(id) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
