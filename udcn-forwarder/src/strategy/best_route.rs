use log::debug;
use udcn_core::{FaceId, Interest};

use super::{Strategy, BEST_ROUTE};
use crate::fib::FibEntry;
use crate::forwarder::Forwarder;
use crate::pit::PitId;

/// Cost added to an upstream whose Interest expired unanswered
pub const DEFAULT_EXPIRY_PENALTY: u32 = 10;

/// Forward to the cheapest usable next hop only.
///
/// Retransmissions are dropped while an upstream is still in flight. An
/// upstream that lets the Interest expire gets its cost raised, so the next
/// Interest tries the runner-up.
#[derive(Debug, Clone, Copy)]
pub struct BestRouteStrategy {
    expiry_penalty: u32,
}

impl BestRouteStrategy {
    pub fn new(expiry_penalty: u32) -> Self {
        Self { expiry_penalty }
    }
}

impl Default for BestRouteStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_PENALTY)
    }
}

impl Strategy for BestRouteStrategy {
    fn name(&self) -> &'static str {
        BEST_ROUTE
    }

    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        _in_face: FaceId,
        interest: &Interest,
        fib_entry: &FibEntry,
        pit: PitId,
    ) {
        if forwarder.has_unexpired_out_records(pit) {
            debug!("best-route {}: retransmission suppressed", interest.name);
            return;
        }

        let chosen = fib_entry
            .next_hops
            .iter()
            .find(|next_hop| forwarder.can_forward_to(pit, next_hop.face));

        match chosen {
            Some(next_hop) => {
                forwarder.send_interest(pit, next_hop.face, next_hop.target_hint.as_deref(), false)
            }
            None => {
                debug!("best-route {}: no usable next hop", interest.name);
                forwarder.reject_pending_interest(pit);
            }
        }
    }

    fn before_expire_pending_interest(&self, forwarder: &mut Forwarder, pit: PitId) {
        let Some(entry) = forwarder.pit_entry(pit) else {
            return;
        };
        let name = entry.name().clone();
        let tried: Vec<FaceId> = entry.out_records().iter().map(|r| r.face).collect();
        for face in tried {
            forwarder.bump_next_hop_cost(&name, face, self.expiry_penalty);
        }
    }
}
