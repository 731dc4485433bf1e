use std::collections::BTreeSet;
use std::time::Duration;

use log::{debug, error, info, warn};
use udcn_core::{Data, FaceId, Interest, Name};

use crate::clock::Timestamp;
use crate::config::ForwarderConfig;
use crate::content_store::{ContentStore, MemoryContentStore};
use crate::counters::ForwarderCounters;
use crate::dead_nonce_list::DeadNonceList;
use crate::error::ForwarderError;
use crate::face::{Face, FaceTable};
use crate::fib::Fib;
use crate::pit::{Pit, PitEntry, PitId};
use crate::scheduler::Scheduler;
use crate::strategy::StrategyChoice;

#[derive(Debug, Clone, Copy)]
enum TimerEvent {
    Unsatisfy(PitId),
    Straggler {
        pit: PitId,
        satisfied: bool,
        freshness: Option<Duration>,
    },
}

/// NDN forwarding pipeline.
///
/// Every entry point runs to completion and never fails; problems are logged
/// and counted. Time only moves when the host calls [`Forwarder::advance_to`].
pub struct Forwarder {
    config: ForwarderConfig,
    faces: FaceTable,
    fib: Fib,
    pit: Pit,
    dead_nonce_list: DeadNonceList,
    content_store: Box<dyn ContentStore>,
    strategy_choice: StrategyChoice,
    scheduler: Scheduler<TimerEvent>,
    counters: ForwarderCounters,
}

impl Forwarder {
    /// Create a forwarder with an in-memory content store sized by `config`
    pub fn new(config: ForwarderConfig) -> Result<Self, ForwarderError> {
        let content_store = Box::new(MemoryContentStore::new(config.content_store.capacity));
        Self::with_parts(config, content_store, ForwarderCounters::new())
    }

    /// Create a forwarder around an existing content store and counters
    pub fn with_parts(
        config: ForwarderConfig,
        content_store: Box<dyn ContentStore>,
        counters: ForwarderCounters,
    ) -> Result<Self, ForwarderError> {
        let strategy_choice = StrategyChoice::from_config(&config.strategy)?;
        let dead_nonce_list = DeadNonceList::new(
            config.dead_nonce_list.lifetime(),
            config.dead_nonce_list.capacity,
        );
        Ok(Self {
            config,
            faces: FaceTable::new(),
            fib: Fib::new(),
            pit: Pit::new(),
            dead_nonce_list,
            content_store,
            strategy_choice,
            scheduler: Scheduler::new(),
            counters,
        })
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.scheduler.now()
    }

    pub fn counters(&self) -> &ForwarderCounters {
        &self.counters
    }

    pub fn faces(&self) -> &FaceTable {
        &self.faces
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn fib_mut(&mut self) -> &mut Fib {
        &mut self.fib
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn pit_entry(&self, pit: PitId) -> Option<&PitEntry> {
        self.pit.get(pit)
    }

    pub fn dead_nonce_list(&self) -> &DeadNonceList {
        &self.dead_nonce_list
    }

    pub fn content_store(&self) -> &dyn ContentStore {
        self.content_store.as_ref()
    }

    pub fn strategy_choice_mut(&mut self) -> &mut StrategyChoice {
        &mut self.strategy_choice
    }

    pub fn add_face(&mut self, face: Box<dyn Face>) -> FaceId {
        self.faces.add(face)
    }

    pub fn add_reserved_face(&mut self, id: FaceId, face: Box<dyn Face>) -> Result<(), ForwarderError> {
        self.faces.add_reserved(id, face)
    }

    /// Remove a face together with its routes and PIT records. Entries left
    /// without any downstream are finalized as unsatisfied.
    pub fn remove_face(&mut self, face: FaceId) -> Result<(), ForwarderError> {
        if self.faces.remove(face).is_none() {
            return Err(ForwarderError::FaceNotFound(face));
        }
        self.fib.remove_face(face);

        for pit in self.pit.ids() {
            let Some(entry) = self.pit.get_mut(pit) else {
                continue;
            };
            let had_downstreams = !entry.in_records().is_empty();
            entry.delete_in_record(face);
            entry.delete_out_record(face);
            if had_downstreams && entry.in_records().is_empty() {
                self.on_interest_finalize(pit, false, None);
            }
        }
        info!("Removed face {} and its forwarding state", face);
        Ok(())
    }

    /// Deadline of the next timer, for hosts that sleep between events
    pub fn next_timer_deadline(&self) -> Option<Timestamp> {
        self.scheduler.next_deadline()
    }

    /// Move the clock to `now`, firing every timer due until then in order
    pub fn advance_to(&mut self, now: Timestamp) {
        while let Some((_, event)) = self.scheduler.pop_due(now) {
            self.on_timer(event);
        }
        self.scheduler.advance_to(now);
        let now = self.now();
        self.dead_nonce_list.evict_expired(now);
    }

    fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Unsatisfy(pit) => self.on_interest_unsatisfied(pit),
            TimerEvent::Straggler {
                pit,
                satisfied,
                freshness,
            } => self.on_interest_finalize(pit, satisfied, freshness),
        }
    }

    /// Incoming Interest pipeline
    pub fn on_incoming_interest(&mut self, face: FaceId, mut interest: Interest) {
        debug!("on_incoming_interest face={} interest={}", face, interest.name);
        self.counters.in_interests += 1;

        if !self.faces.contains(face) {
            warn!("on_incoming_interest face={} unknown face", face);
            return;
        }
        interest.incoming_face = Some(face);
        let from_local = self.faces.is_local(face);

        // the hint only addresses this hop
        if let Some(target) = interest.target_hint.take() {
            if let Some(own) = self.faces.address(face) {
                if own != target {
                    debug!(
                        "on_incoming_interest face={} interest={} addressed to {}",
                        face, interest.name, target
                    );
                    self.counters.foreign_target_drops += 1;
                    return;
                }
            }
        }

        if let Some(hop_limit) = interest.hop_limit {
            if hop_limit == 0 {
                debug!(
                    "on_incoming_interest face={} interest={} hop limit exhausted",
                    face, interest.name
                );
                return;
            }
            if !from_local {
                interest.hop_limit = Some(hop_limit - 1);
            }
        }

        if !from_local && Name::localhost().is_prefix_of(&interest.name) {
            debug!(
                "on_incoming_interest face={} interest={} violates /localhost",
                face, interest.name
            );
            self.counters.scope_violations += 1;
            return;
        }

        // loops never get a PIT entry of their own
        if self.dead_nonce_list.has(&interest.name, interest.nonce) {
            self.on_interest_loop(face, &interest);
            return;
        }
        let mut duplicate = false;
        if let Some(entry) = self.pit.find(&interest.name).and_then(|id| self.pit.get(id)) {
            let seen = entry.find_nonce(interest.nonce, face);
            if seen.is_loop() {
                self.on_interest_loop(face, &interest);
                return;
            }
            duplicate = seen.is_duplicate();
        }

        let (pit, _) = self.pit.insert(&interest.name);
        if duplicate {
            self.on_duplicate_nonce(face, pit, &interest);
            return;
        }
        self.cancel_unsatisfy_and_straggler_timer(pit);

        let now = self.now();
        let is_pending = self
            .pit
            .get(pit)
            .is_some_and(|entry| entry.has_unexpired_in_records(now));
        if !is_pending {
            if let Some(data) = self.content_store.find(&interest, now) {
                self.counters.cs_hits += 1;
                self.on_content_store_hit(face, pit, &interest, data);
                return;
            }
            self.counters.cs_misses += 1;
        }
        self.on_content_store_miss(face, pit, &interest);
    }

    fn on_interest_loop(&mut self, face: FaceId, interest: &Interest) {
        debug!(
            "on_interest_loop face={} interest={} nonce={:08x}",
            face, interest.name, interest.nonce
        );
        self.counters.interest_loops += 1;
    }

    /// Another downstream sent a nonce this entry already carries. It waits
    /// for the same Data but gives the strategy nothing new to forward.
    fn on_duplicate_nonce(&mut self, face: FaceId, pit: PitId, interest: &Interest) {
        debug!(
            "on_duplicate_nonce face={} interest={} nonce={:08x}",
            face, interest.name, interest.nonce
        );
        self.counters.duplicate_nonces += 1;
        let now = self.now();
        let lifetime = self.interest_lifetime(interest);
        let Some(entry) = self.pit.get_mut(pit) else {
            return;
        };
        entry.insert_or_update_in_record(face, interest, now, lifetime);
        self.set_unsatisfy_timer(pit);
    }

    fn on_content_store_miss(&mut self, face: FaceId, pit: PitId, interest: &Interest) {
        debug!("on_content_store_miss interest={}", interest.name);
        let now = self.now();
        let lifetime = self.interest_lifetime(interest);
        let Some(entry) = self.pit.get_mut(pit) else {
            return;
        };
        entry.insert_or_update_in_record(face, interest, now, lifetime);
        self.set_unsatisfy_timer(pit);

        let fib_entry = self.fib.find_longest_prefix_match(&interest.name);
        let strategy = self.strategy_choice.find_effective_strategy(&interest.name);
        strategy.after_receive_interest(self, face, interest, &fib_entry, pit);
    }

    fn on_content_store_hit(&mut self, face: FaceId, pit: PitId, interest: &Interest, mut data: Data) {
        debug!("on_content_store_hit interest={}", interest.name);
        let now = self.now();
        let lifetime = self.interest_lifetime(interest);
        if let Some(entry) = self.pit.get_mut(pit) {
            entry.insert_or_update_in_record(face, interest, now, lifetime);
        }

        data.incoming_face = Some(FaceId::CONTENT_STORE);
        let strategy = self.strategy_choice.find_effective_strategy(&interest.name);
        strategy.before_satisfy_interest(self, pit, FaceId::CONTENT_STORE, &data);

        if let Some(entry) = self.pit.get_mut(pit) {
            entry.clear_in_records();
        }
        self.set_straggler_timer(pit, true, data.freshness_period);
        self.on_outgoing_data(&data, face);
    }

    /// Send the pending Interest of `pit` to `out_face`. Strategy entry point.
    pub fn send_interest(
        &mut self,
        pit: PitId,
        out_face: FaceId,
        target_hint: Option<&str>,
        want_new_nonce: bool,
    ) {
        self.on_outgoing_interest(pit, out_face, target_hint, want_new_nonce);
    }

    /// Give up on `pit`. Strategy entry point; refused while an upstream is in flight.
    pub fn reject_pending_interest(&mut self, pit: PitId) {
        self.on_interest_reject(pit);
    }

    /// Outgoing Interest pipeline
    pub fn on_outgoing_interest(
        &mut self,
        pit: PitId,
        out_face: FaceId,
        target_hint: Option<&str>,
        want_new_nonce: bool,
    ) {
        let Some(entry) = self.pit.get(pit) else {
            return;
        };
        if !out_face.is_valid() || !self.faces.contains(out_face) {
            warn!(
                "on_outgoing_interest face=invalid interest={}",
                entry.name()
            );
            self.counters.invalid_face_sends += 1;
            return;
        }
        debug!(
            "on_outgoing_interest face={} interest={}",
            out_face,
            entry.name()
        );

        if violates_scope(&self.faces, entry, out_face) {
            debug!(
                "on_outgoing_interest face={} interest={} violates scope",
                out_face,
                entry.name()
            );
            self.counters.scope_violations += 1;
            return;
        }

        // latest Interest not from out_face; out_face itself only if it is the sole downstream
        let Some(picked) = entry
            .in_records()
            .iter()
            .max_by_key(|r| (r.face != out_face, r.last_renewed))
        else {
            return;
        };
        let mut interest = picked.interest.clone();
        if want_new_nonce {
            interest.refresh_nonce();
        }

        if interest.hop_limit == Some(0) && !self.faces.is_local(out_face) {
            debug!(
                "on_outgoing_interest face={} interest={} hop limit exhausted",
                out_face, interest.name
            );
            return;
        }

        let now = self.now();
        let lifetime = self.interest_lifetime(&interest);
        if let Some(entry) = self.pit.get_mut(pit) {
            entry.insert_or_update_out_record(out_face, interest.nonce, now, lifetime);
        }

        interest.incoming_face = None;
        interest.target_hint = target_hint.map(str::to_string);
        if let Some(face) = self.faces.get_mut(out_face) {
            face.send_interest(interest);
        }
        self.counters.out_interests += 1;
    }

    /// Interest reject pipeline
    pub fn on_interest_reject(&mut self, pit: PitId) {
        let now = self.now();
        let Some(entry) = self.pit.get(pit) else {
            return;
        };
        if entry.has_unexpired_out_records(now) {
            error!(
                "on_interest_reject interest={} cannot reject forwarded Interest",
                entry.name()
            );
            self.counters.strategy_violations += 1;
            return;
        }
        debug!("on_interest_reject interest={}", entry.name());
        self.counters.rejected_interests += 1;

        self.cancel_unsatisfy_and_straggler_timer(pit);
        self.set_straggler_timer(pit, false, None);
    }

    fn on_interest_unsatisfied(&mut self, pit: PitId) {
        let Some(entry) = self.pit.get_mut(pit) else {
            return;
        };
        entry.unsatisfy_timer = None;
        let name = entry.name().clone();
        debug!("on_interest_unsatisfied interest={}", name);

        let strategy = self.strategy_choice.find_effective_strategy(&name);
        strategy.before_expire_pending_interest(self, pit);

        self.on_interest_finalize(pit, false, None);
    }

    /// The only path that erases a PIT entry
    fn on_interest_finalize(&mut self, pit: PitId, satisfied: bool, freshness: Option<Duration>) {
        let Some(entry) = self.pit.get(pit) else {
            return;
        };
        debug!(
            "on_interest_finalize interest={} {}",
            entry.name(),
            if satisfied { "satisfied" } else { "unsatisfied" }
        );

        self.insert_dead_nonce_list(pit, satisfied, freshness, None);
        if satisfied {
            self.counters.satisfied_interests += 1;
        } else {
            self.counters.unsatisfied_interests += 1;
        }

        self.cancel_unsatisfy_and_straggler_timer(pit);
        self.pit.erase(pit);
    }

    /// Incoming Data pipeline
    pub fn on_incoming_data(&mut self, face: FaceId, mut data: Data) {
        debug!("on_incoming_data face={} data={}", face, data.name);
        self.counters.in_data += 1;

        if !self.faces.contains(face) {
            warn!("on_incoming_data face={} unknown face", face);
            return;
        }
        data.incoming_face = Some(face);

        if !self.faces.is_local(face) && Name::localhost().is_prefix_of(&data.name) {
            debug!(
                "on_incoming_data face={} data={} violates /localhost",
                face, data.name
            );
            self.counters.scope_violations += 1;
            return;
        }

        let matches = self.pit.find_all_data_matches(&data.name);
        if matches.is_empty() {
            self.on_data_unsolicited(face, &data);
            return;
        }

        let now = self.now();
        self.content_store.insert(&data, false, now);

        let mut pending_downstreams = BTreeSet::new();
        for pit in matches {
            self.cancel_unsatisfy_and_straggler_timer(pit);
            let Some(entry) = self.pit.get(pit) else {
                continue;
            };
            pending_downstreams.extend(
                entry
                    .in_records()
                    .iter()
                    .filter(|r| r.expiry > now)
                    .map(|r| r.face),
            );

            let strategy = self.strategy_choice.find_effective_strategy(entry.name());
            strategy.before_satisfy_interest(self, pit, face, &data);

            self.insert_dead_nonce_list(pit, true, data.freshness_period, Some(face));

            if let Some(entry) = self.pit.get_mut(pit) {
                entry.clear_in_records();
                entry.delete_out_record(face);
            }
            self.set_straggler_timer(pit, true, data.freshness_period);
        }

        for downstream in pending_downstreams {
            if downstream == face {
                continue;
            }
            self.on_outgoing_data(&data, downstream);
        }
    }

    /// Data that no PIT entry asked for. Cached only when it comes from a local face.
    pub fn on_data_unsolicited(&mut self, face: FaceId, data: &Data) {
        self.counters.unsolicited_data += 1;
        let accept_to_cache = self.faces.is_local(face);
        if accept_to_cache {
            let now = self.now();
            self.content_store.insert(data, true, now);
        }
        debug!(
            "on_data_unsolicited face={} data={} {}",
            face,
            data.name,
            if accept_to_cache { "cached" } else { "not cached" }
        );
    }

    /// Outgoing Data pipeline
    pub fn on_outgoing_data(&mut self, data: &Data, out_face: FaceId) {
        if !out_face.is_valid() || !self.faces.contains(out_face) {
            warn!("on_outgoing_data face=invalid data={}", data.name);
            self.counters.invalid_face_sends += 1;
            return;
        }
        debug!("on_outgoing_data face={} data={}", out_face, data.name);

        if !self.faces.is_local(out_face) && Name::localhost().is_prefix_of(&data.name) {
            debug!(
                "on_outgoing_data face={} data={} violates /localhost",
                out_face, data.name
            );
            self.counters.scope_violations += 1;
            return;
        }

        let mut data = data.clone();
        data.incoming_face = None;
        if let Some(face) = self.faces.get_mut(out_face) {
            face.send_data(data);
        }
        self.counters.out_data += 1;
    }

    /// Whether a strategy may forward the pending Interest of `pit` to `face`:
    /// nothing in flight there yet, another downstream still waiting, and no
    /// scope crossed.
    pub fn can_forward_to(&self, pit: PitId, face: FaceId) -> bool {
        let Some(entry) = self.pit.get(pit) else {
            return false;
        };
        let now = self.now();
        let pending_upstream = entry
            .out_records()
            .iter()
            .any(|r| r.face == face && r.expiry > now);
        if pending_upstream {
            return false;
        }
        let has_other_downstream = entry
            .in_records()
            .iter()
            .any(|r| r.face != face && r.expiry > now);
        if !has_other_downstream {
            return false;
        }
        !violates_scope(&self.faces, entry, face)
    }

    pub fn has_unexpired_out_records(&self, pit: PitId) -> bool {
        let now = self.now();
        self.pit
            .get(pit)
            .is_some_and(|entry| entry.has_unexpired_out_records(now))
    }

    /// Soft cost feedback from a strategy
    pub fn bump_next_hop_cost(&mut self, name: &Name, face: FaceId, delta: u32) -> bool {
        let bumped = self.fib.bump_cost(name, face, delta);
        if bumped {
            debug!("bumped cost of face {} for {} by {}", face, name, delta);
        }
        bumped
    }

    fn interest_lifetime(&self, interest: &Interest) -> Duration {
        interest
            .interest_lifetime
            .unwrap_or_else(|| self.config.default_interest_lifetime())
    }

    fn set_unsatisfy_timer(&mut self, pit: PitId) {
        let Some(entry) = self.pit.get_mut(pit) else {
            return;
        };
        let Some(last_expiry) = entry.last_in_record_expiry() else {
            return;
        };
        if let Some(previous) = entry.unsatisfy_timer.take() {
            self.scheduler.cancel(previous);
        }
        entry.unsatisfy_timer = Some(
            self.scheduler
                .schedule_at(last_expiry, TimerEvent::Unsatisfy(pit)),
        );
    }

    fn set_straggler_timer(&mut self, pit: PitId, satisfied: bool, freshness: Option<Duration>) {
        let Some(entry) = self.pit.get_mut(pit) else {
            return;
        };
        if let Some(previous) = entry.straggler_timer.take() {
            self.scheduler.cancel(previous);
        }
        let event = TimerEvent::Straggler {
            pit,
            satisfied,
            freshness,
        };
        entry.straggler_timer = Some(self.scheduler.schedule(self.config.straggler_time(), event));
    }

    fn cancel_unsatisfy_and_straggler_timer(&mut self, pit: PitId) {
        let Some(entry) = self.pit.get_mut(pit) else {
            return;
        };
        for timer in [entry.unsatisfy_timer.take(), entry.straggler_timer.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(timer);
        }
    }

    /// Record the nonces sent upstream so that late loops are still caught.
    ///
    /// Unsatisfied entries always record. Satisfied ones only when fresh Data
    /// was asked for and it goes stale before the list forgets the nonce.
    /// With `upstream` set, only the out-record towards it is recorded.
    fn insert_dead_nonce_list(
        &mut self,
        pit: PitId,
        satisfied: bool,
        freshness: Option<Duration>,
        upstream: Option<FaceId>,
    ) {
        let Some(entry) = self.pit.get(pit) else {
            return;
        };
        let needed = !satisfied
            || (entry.must_be_fresh()
                && freshness.is_some_and(|f| f < self.dead_nonce_list.lifetime()));
        if !needed {
            return;
        }

        let name = entry.name().clone();
        let nonces: Vec<u32> = entry
            .out_records()
            .iter()
            .filter(|r| upstream.map_or(true, |face| r.face == face))
            .map(|r| r.last_nonce)
            .collect();
        let now = self.now();
        for nonce in nonces {
            self.dead_nonce_list.add(&name, nonce, now);
        }
    }
}

/// `/localhost` never leaves through a non-local face; `/localhop` only does
/// when some downstream is local.
fn violates_scope(faces: &FaceTable, entry: &PitEntry, out_face: FaceId) -> bool {
    if faces.is_local(out_face) {
        return false;
    }
    if Name::localhost().is_prefix_of(entry.name()) {
        return true;
    }
    if Name::localhop().is_prefix_of(entry.name()) {
        return !entry.in_records().iter().any(|r| faces.is_local(r.face));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{FaceOutbox, MemoryFace};
    use crate::fib::NextHop;

    const LIFETIME: Duration = Duration::from_millis(1000);

    fn name(uri: &str) -> Name {
        Name::from_str(uri).unwrap()
    }

    fn interest(uri: &str, nonce: u32) -> Interest {
        Interest::new(name(uri)).with_nonce(nonce).with_lifetime(LIFETIME)
    }

    fn data(uri: &str) -> Data {
        Data::new(name(uri), b"hello".to_vec())
    }

    fn forwarder() -> Forwarder {
        Forwarder::new(ForwarderConfig::default()).unwrap()
    }

    fn add_face(fw: &mut Forwarder, label: &str, local: bool) -> (FaceId, FaceOutbox) {
        let (face, outbox) = MemoryFace::new(label, local);
        (fw.add_face(Box::new(face)), outbox)
    }

    fn route(fw: &mut Forwarder, prefix: &str, face: FaceId, cost: u32) {
        fw.fib_mut().add_next_hop(&name(prefix), NextHop::new(face, cost));
    }

    /// Two downstreams and one upstream, everything under `/` routed upstream
    struct Triangle {
        fw: Forwarder,
        f1: FaceId,
        f2: FaceId,
        f3: FaceId,
        out1: FaceOutbox,
        out2: FaceOutbox,
        out3: FaceOutbox,
    }

    fn triangle() -> Triangle {
        let mut fw = forwarder();
        let (f1, out1) = add_face(&mut fw, "down1", false);
        let (f2, out2) = add_face(&mut fw, "down2", false);
        let (f3, out3) = add_face(&mut fw, "up", false);
        route(&mut fw, "/", f3, 1);
        Triangle {
            fw,
            f1,
            f2,
            f3,
            out1,
            out2,
            out3,
        }
    }

    #[test]
    fn test_same_name_aggregated_into_one_entry() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a/b", 1));
        t.fw.on_incoming_interest(t.f2, interest("/a/b", 1));

        assert_eq!(t.fw.pit().len(), 1);
        let pit = t.fw.pit().find(&name("/a/b")).unwrap();
        let entry = t.fw.pit_entry(pit).unwrap();
        assert_eq!(entry.in_records().len(), 2);
        assert_eq!(entry.out_records().len(), 1);
        assert_eq!(entry.out_records()[0].face, t.f3);

        assert_eq!(t.out3.take_interests().len(), 1);
        assert_eq!(t.fw.counters().out_interests, 1);
        assert_eq!(t.fw.counters().interest_loops, 0);
        assert_eq!(t.fw.counters().duplicate_nonces, 1);
    }

    #[test]
    fn test_known_nonce_from_new_face_is_not_forwarded() {
        let mut t = triangle();
        // arrives from the only next hop, so it is rejected but stays recorded
        t.fw.on_incoming_interest(t.f3, interest("/x", 1));
        assert!(t.out3.is_empty());
        assert_eq!(t.fw.counters().rejected_interests, 1);

        t.fw.on_incoming_interest(t.f2, interest("/x", 1));
        assert!(t.out3.take_interests().is_empty());
        assert_eq!(t.fw.counters().out_interests, 0);
        assert_eq!(t.fw.counters().duplicate_nonces, 1);

        let pit = t.fw.pit().find(&name("/x")).unwrap();
        let entry = t.fw.pit_entry(pit).unwrap();
        assert_eq!(entry.in_records().len(), 2);
        assert!(entry.out_records().is_empty());

        // the pending reject still finalizes the entry
        t.fw.advance_to(Timestamp::from_millis(100));
        assert!(t.fw.pit().is_empty());
        assert_eq!(t.fw.counters().unsatisfied_interests, 1);
        assert_eq!(t.fw.next_timer_deadline(), None);
    }

    #[test]
    fn test_known_nonce_from_new_face_still_gets_data() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/x", 1));
        t.fw.on_incoming_interest(t.f2, interest("/x", 1));
        assert_eq!(t.out3.take_interests().len(), 1);

        t.fw.on_incoming_data(t.f3, data("/x"));
        assert_eq!(t.out1.take_data().len(), 1);
        assert_eq!(t.out2.take_data().len(), 1);
    }

    #[test]
    fn test_target_hint_carried_to_upstream() {
        let mut fw = forwarder();
        let (f1, _) = add_face(&mut fw, "down", false);
        let (f3, out3) = add_face(&mut fw, "wifi", false);
        let mut hop = NextHop::new(f3, 1);
        hop.target_hint = Some("00:00:00:00:00:07".to_string());
        fw.fib_mut().add_next_hop(&name("/"), hop);

        fw.on_incoming_interest(f1, interest("/a", 1).with_target_hint("ignored-upstream"));
        let sent = out3.take_interests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target_hint.as_deref(), Some("00:00:00:00:00:07"));
    }

    #[test]
    fn test_interest_for_other_receiver_dropped() {
        let mut fw = forwarder();
        let (radio, _) = MemoryFace::new("radio", false);
        let radio = fw.add_face(Box::new(radio.with_address("00:00:00:00:00:02")));
        let (f3, out3) = add_face(&mut fw, "up", false);
        route(&mut fw, "/", f3, 1);

        fw.on_incoming_interest(radio, interest("/a", 1).with_target_hint("00:00:00:00:00:05"));
        assert!(fw.pit().is_empty());
        assert!(out3.is_empty());
        assert_eq!(fw.counters().foreign_target_drops, 1);

        fw.on_incoming_interest(radio, interest("/a", 2).with_target_hint("00:00:00:00:00:02"));
        let sent = out3.take_interests();
        assert_eq!(sent.len(), 1);
        // no FIB hint on this route, so the hint does not travel further
        assert_eq!(sent[0].target_hint, None);

        fw.on_incoming_interest(radio, interest("/b", 3));
        assert_eq!(out3.take_interests().len(), 1);
    }

    #[test]
    fn test_data_fans_out_to_downstreams_only() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a/b", 1));
        t.fw.on_incoming_interest(t.f2, interest("/a/b", 2));
        t.out3.drain();

        t.fw.on_incoming_data(t.f3, data("/a/b"));

        assert_eq!(t.out1.take_data().len(), 1);
        assert_eq!(t.out2.take_data().len(), 1);
        assert!(t.out3.is_empty());
        assert_eq!(t.fw.counters().out_data, 2);

        // entry lingers for the straggler window, then goes exactly once
        assert_eq!(t.fw.pit().len(), 1);
        t.fw.advance_to(Timestamp::from_millis(99));
        assert_eq!(t.fw.pit().len(), 1);
        t.fw.advance_to(Timestamp::from_millis(100));
        assert!(t.fw.pit().is_empty());
        assert_eq!(t.fw.counters().satisfied_interests, 1);
        assert_eq!(t.fw.next_timer_deadline(), None);

        t.fw.advance_to(Timestamp::from_millis(5000));
        assert_eq!(t.fw.counters().satisfied_interests, 1);
        assert_eq!(t.fw.counters().unsatisfied_interests, 0);
    }

    #[test]
    fn test_same_nonce_same_face_is_loop() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/x", 7));
        t.fw.on_incoming_interest(t.f1, interest("/x", 7));

        assert_eq!(t.fw.counters().interest_loops, 1);
        assert_eq!(t.out3.take_interests().len(), 1);
        let pit = t.fw.pit().find(&name("/x")).unwrap();
        assert_eq!(t.fw.pit_entry(pit).unwrap().out_records().len(), 1);
    }

    #[test]
    fn test_interest_returning_from_upstream_is_loop() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/x", 7));
        t.fw.on_incoming_interest(t.f3, interest("/x", 7));

        assert_eq!(t.fw.counters().interest_loops, 1);
        let pit = t.fw.pit().find(&name("/x")).unwrap();
        assert_eq!(t.fw.pit_entry(pit).unwrap().in_records().len(), 1);
    }

    #[test]
    fn test_dead_nonce_suppresses_loop_after_expiry() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 5));
        assert_eq!(t.out3.take_interests().len(), 1);

        t.fw.advance_to(Timestamp::from_millis(1000));
        assert!(t.fw.pit().is_empty());
        assert_eq!(t.fw.counters().unsatisfied_interests, 1);
        assert!(t.fw.dead_nonce_list().has(&name("/a"), 5));

        t.fw.on_incoming_interest(t.f2, interest("/a", 5));
        assert_eq!(t.fw.counters().interest_loops, 1);
        assert!(t.fw.pit().is_empty());
        assert!(t.out3.is_empty());

        // once the list forgets the nonce the Interest is forwarded again
        t.fw.advance_to(Timestamp::from_millis(7000));
        assert!(!t.fw.dead_nonce_list().has(&name("/a"), 5));
        t.fw.on_incoming_interest(t.f2, interest("/a", 5));
        assert_eq!(t.out3.take_interests().len(), 1);
    }

    #[test]
    fn test_unsatisfy_timer_follows_latest_in_record() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 1));
        t.fw.on_incoming_interest(
            t.f2,
            interest("/a", 2).with_lifetime(Duration::from_millis(3000)),
        );

        t.fw.advance_to(Timestamp::from_millis(1500));
        assert_eq!(t.fw.pit().len(), 1);
        assert_eq!(t.fw.next_timer_deadline(), Some(Timestamp::from_millis(3000)));
        t.fw.advance_to(Timestamp::from_millis(3000));
        assert!(t.fw.pit().is_empty());
    }

    #[test]
    fn test_content_store_hit_skips_upstream() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a/b", 1));
        assert_eq!(t.fw.counters().cs_misses, 1);
        t.fw.on_incoming_data(t.f3, data("/a/b/v1"));
        t.fw.advance_to(Timestamp::from_millis(200));
        t.out1.drain();
        t.out3.drain();

        t.fw.on_incoming_interest(t.f2, interest("/a/b", 2));

        assert_eq!(t.fw.counters().cs_hits, 1);
        let served = t.out2.take_data();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0].name, name("/a/b/v1"));
        assert_eq!(served[0].incoming_face, None);
        assert!(t.out3.is_empty());

        t.fw.advance_to(Timestamp::from_millis(400));
        assert!(t.fw.pit().is_empty());
        assert_eq!(t.fw.counters().satisfied_interests, 2);
    }

    #[test]
    fn test_must_be_fresh_ignores_stale_cache() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 1));
        t.fw.on_incoming_data(t.f3, data("/a"));
        t.fw.advance_to(Timestamp::from_millis(200));
        t.out3.drain();

        t.fw.on_incoming_interest(t.f2, interest("/a", 2).with_must_be_fresh(true));
        assert_eq!(t.fw.counters().cs_hits, 0);
        assert_eq!(t.out3.take_interests().len(), 1);
    }

    #[test]
    fn test_fresh_data_records_nonce_in_dead_nonce_list() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 9).with_must_be_fresh(true));
        let fresh = data("/a").with_freshness_period(Duration::from_millis(1000));
        t.fw.on_incoming_data(t.f3, fresh);
        assert!(t.fw.dead_nonce_list().has(&name("/a"), 9));

        t.fw.on_incoming_interest(t.f1, interest("/b", 10).with_must_be_fresh(true));
        t.fw.on_incoming_data(t.f3, data("/b"));
        assert!(!t.fw.dead_nonce_list().has(&name("/b"), 10));

        t.fw.on_incoming_interest(t.f1, interest("/c", 11));
        let fresh = data("/c").with_freshness_period(Duration::from_millis(1000));
        t.fw.on_incoming_data(t.f3, fresh);
        assert!(!t.fw.dead_nonce_list().has(&name("/c"), 11));
    }

    #[test]
    fn test_data_satisfying_several_entries_sent_once_per_face() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 1));
        t.fw.on_incoming_interest(t.f1, interest("/a/b", 2));
        t.fw.on_incoming_interest(t.f2, interest("/a/b", 3));

        t.fw.on_incoming_data(t.f3, data("/a/b/c"));

        assert_eq!(t.out1.take_data().len(), 1);
        assert_eq!(t.out2.take_data().len(), 1);
        t.fw.advance_to(Timestamp::from_millis(100));
        assert!(t.fw.pit().is_empty());
        assert_eq!(t.fw.counters().satisfied_interests, 2);
    }

    #[test]
    fn test_no_route_rejects_then_finalizes() {
        let mut fw = forwarder();
        let (f1, _) = add_face(&mut fw, "down", false);
        fw.on_incoming_interest(f1, interest("/nowhere", 1));

        assert_eq!(fw.counters().rejected_interests, 1);
        assert_eq!(fw.pit().len(), 1);
        fw.advance_to(Timestamp::from_millis(100));
        assert!(fw.pit().is_empty());
        assert_eq!(fw.counters().unsatisfied_interests, 1);
        assert!(!fw.dead_nonce_list().has(&name("/nowhere"), 1));
    }

    #[test]
    fn test_reject_refused_while_upstream_in_flight() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 1));
        let pit = t.fw.pit().find(&name("/a")).unwrap();

        t.fw.reject_pending_interest(pit);

        assert_eq!(t.fw.counters().strategy_violations, 1);
        assert_eq!(t.fw.counters().rejected_interests, 0);
        t.fw.advance_to(Timestamp::from_millis(500));
        assert!(t.fw.pit_entry(pit).is_some());
        t.fw.advance_to(Timestamp::from_millis(1000));
        assert!(t.fw.pit_entry(pit).is_none());
    }

    #[test]
    fn test_send_to_invalid_face_is_noop() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 1));
        let pit = t.fw.pit().find(&name("/a")).unwrap();

        t.fw.send_interest(pit, FaceId::INVALID, None, false);
        t.fw.send_interest(pit, FaceId(9999), None, false);
        t.fw.on_outgoing_data(&data("/a"), FaceId::INVALID);

        assert_eq!(t.fw.counters().invalid_face_sends, 3);
        assert_eq!(t.fw.pit_entry(pit).unwrap().out_records().len(), 1);
    }

    #[test]
    fn test_new_nonce_on_request() {
        let mut t = triangle();
        let (f4, out4) = add_face(&mut t.fw, "up2", false);
        t.fw.on_incoming_interest(t.f1, interest("/a", 1));
        let pit = t.fw.pit().find(&name("/a")).unwrap();

        t.fw.send_interest(pit, f4, None, true);

        let sent = out4.take_interests();
        assert_eq!(sent.len(), 1);
        assert_ne!(sent[0].nonce, 1);
        let record = t.fw.pit_entry(pit).unwrap().out_record(f4).unwrap();
        assert_eq!(record.last_nonce, sent[0].nonce);
    }

    #[test]
    fn test_sole_downstream_is_never_a_next_hop() {
        let mut fw = forwarder();
        let (f1, out1) = add_face(&mut fw, "both", false);
        route(&mut fw, "/", f1, 1);

        fw.on_incoming_interest(f1, interest("/a", 1));

        assert!(out1.is_empty());
        assert_eq!(fw.counters().rejected_interests, 1);
    }

    #[test]
    fn test_localhost_scope() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/localhost/status", 1));
        assert!(t.fw.pit().is_empty());
        assert_eq!(t.fw.counters().scope_violations, 1);

        let (app, _) = add_face(&mut t.fw, "app", true);
        t.fw.on_incoming_interest(app, interest("/localhost/status", 2));
        assert!(t.out3.is_empty());
        assert_eq!(t.fw.counters().rejected_interests, 1);

        t.fw.on_incoming_data(t.f3, data("/localhost/status"));
        assert_eq!(t.fw.counters().scope_violations, 2);
    }

    #[test]
    fn test_localhop_scope() {
        let mut t = triangle();
        let (app, _) = add_face(&mut t.fw, "app", true);

        t.fw.on_incoming_interest(app, interest("/localhop/x", 1));
        assert_eq!(t.out3.take_interests().len(), 1);

        t.fw.on_incoming_interest(t.f1, interest("/localhop/y", 2));
        assert!(t.out3.is_empty());
    }

    #[test]
    fn test_hop_limit() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 1).with_hop_limit(3));
        let sent = t.out3.take_interests();
        assert_eq!(sent[0].hop_limit, Some(2));

        t.fw.on_incoming_interest(t.f1, interest("/b", 2).with_hop_limit(0));
        assert!(t.fw.pit().find(&name("/b")).is_none());

        t.fw.on_incoming_interest(t.f1, interest("/c", 3).with_hop_limit(1));
        assert!(t.out3.is_empty());

        let (app, _) = add_face(&mut t.fw, "app", true);
        t.fw.on_incoming_interest(app, interest("/d", 4).with_hop_limit(1));
        assert_eq!(t.out3.take_interests()[0].hop_limit, Some(1));
    }

    #[test]
    fn test_unsolicited_data_cached_only_from_local_face() {
        let mut t = triangle();
        t.fw.on_incoming_data(t.f3, data("/u/1"));
        assert!(t.fw.content_store().is_empty());

        let (app, _) = add_face(&mut t.fw, "app", true);
        t.fw.on_incoming_data(app, data("/u/2"));
        assert_eq!(t.fw.content_store().len(), 1);
        assert_eq!(t.fw.counters().unsolicited_data, 2);
    }

    #[test]
    fn test_remove_face_cleans_up() {
        let mut t = triangle();
        t.fw.on_incoming_interest(t.f1, interest("/a", 1));
        t.fw.on_incoming_interest(t.f1, interest("/b", 2));
        t.fw.on_incoming_interest(t.f2, interest("/b", 3));

        t.fw.remove_face(t.f1).unwrap();
        assert!(t.fw.pit().find(&name("/a")).is_none());
        assert_eq!(t.fw.counters().unsatisfied_interests, 1);
        let pit = t.fw.pit().find(&name("/b")).unwrap();
        assert_eq!(t.fw.pit_entry(pit).unwrap().in_records().len(), 1);

        t.fw.remove_face(t.f3).unwrap();
        assert!(t.fw.fib().is_empty());
        assert!(t.fw.pit_entry(pit).unwrap().out_records().is_empty());

        assert!(matches!(
            t.fw.remove_face(t.f3),
            Err(ForwarderError::FaceNotFound(_))
        ));
    }

    #[test]
    fn test_best_route_fails_over_after_expiry() {
        let mut config = ForwarderConfig::default();
        config.strategy[0].name = "best-route".to_string();
        let mut fw = Forwarder::new(config).unwrap();
        let (f1, _) = add_face(&mut fw, "down", false);
        let (f3, out3) = add_face(&mut fw, "cheap", false);
        let (f4, out4) = add_face(&mut fw, "dear", false);
        route(&mut fw, "/a", f3, 1);
        route(&mut fw, "/a", f4, 5);

        fw.on_incoming_interest(f1, interest("/a/1", 1));
        assert_eq!(out3.take_interests().len(), 1);
        assert!(out4.is_empty());

        // retransmission while the upstream is still in flight
        fw.on_incoming_interest(f1, interest("/a/1", 2));
        assert!(out3.is_empty());
        assert!(out4.is_empty());

        fw.advance_to(Timestamp::from_millis(1000));
        assert_eq!(fw.fib().find_exact_match(&name("/a")).unwrap().next_hops[0].face, f4);

        fw.on_incoming_interest(f1, interest("/a/2", 3));
        assert_eq!(out4.take_interests().len(), 1);
        assert!(out3.is_empty());
    }

    #[test]
    fn test_with_parts_keeps_injected_counters() {
        let counters = ForwarderCounters {
            in_interests: 10,
            ..Default::default()
        };
        let mut fw = Forwarder::with_parts(
            ForwarderConfig::default(),
            Box::new(MemoryContentStore::new(0)),
            counters,
        )
        .unwrap();
        let (f1, _) = add_face(&mut fw, "down", false);
        fw.on_incoming_interest(f1, interest("/a", 1));
        assert_eq!(fw.counters().in_interests, 11);
    }
}
