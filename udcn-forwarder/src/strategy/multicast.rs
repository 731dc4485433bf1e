use log::{debug, trace};
use udcn_core::{FaceId, Interest};

use super::{Strategy, MULTICAST};
use crate::fib::FibEntry;
use crate::forwarder::Forwarder;
use crate::pit::PitId;

/// Forward to every usable next hop; reject when nothing is in flight afterwards
#[derive(Debug, Clone, Copy, Default)]
pub struct MulticastStrategy;

impl Strategy for MulticastStrategy {
    fn name(&self) -> &'static str {
        MULTICAST
    }

    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        _in_face: FaceId,
        interest: &Interest,
        fib_entry: &FibEntry,
        pit: PitId,
    ) {
        for next_hop in &fib_entry.next_hops {
            if forwarder.can_forward_to(pit, next_hop.face) {
                trace!("multicast {} via face {}", interest.name, next_hop.face);
                forwarder.send_interest(pit, next_hop.face, next_hop.target_hint.as_deref(), false);
            }
        }

        if !forwarder.has_unexpired_out_records(pit) {
            debug!("multicast {}: no usable next hop", interest.name);
            forwarder.reject_pending_interest(pit);
        }
    }
}
