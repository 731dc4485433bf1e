//! Forwarding strategies.
//!
//! A strategy decides where a pending Interest goes. It talks back to the
//! pipeline only through [`Forwarder::send_interest`] and
//! [`Forwarder::reject_pending_interest`]; the PIT records themselves are
//! never touched here.

mod best_route;
mod choice;
mod multicast;

use std::rc::Rc;

use udcn_core::{Data, FaceId, Interest};

use crate::error::ForwarderError;
use crate::fib::FibEntry;
use crate::forwarder::Forwarder;
use crate::pit::PitId;

pub use best_route::BestRouteStrategy;
pub use choice::StrategyChoice;
pub use multicast::MulticastStrategy;

pub const MULTICAST: &str = "multicast";
pub const BEST_ROUTE: &str = "best-route";

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// A new or renewed Interest missed the cache and needs a forwarding decision
    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        in_face: FaceId,
        interest: &Interest,
        fib_entry: &FibEntry,
        pit: PitId,
    );

    /// Data is about to satisfy the entry. `in_face` is where the Data came from.
    fn before_satisfy_interest(
        &self,
        _forwarder: &mut Forwarder,
        _pit: PitId,
        _in_face: FaceId,
        _data: &Data,
    ) {
    }

    /// The entry's unsatisfy timer fired
    fn before_expire_pending_interest(&self, _forwarder: &mut Forwarder, _pit: PitId) {}
}

pub fn is_known(name: &str) -> bool {
    matches!(name, MULTICAST | BEST_ROUTE)
}

/// Instantiate a strategy by its configuration name
pub fn make_strategy(name: &str) -> Result<Rc<dyn Strategy>, ForwarderError> {
    match name {
        MULTICAST => Ok(Rc::new(MulticastStrategy)),
        BEST_ROUTE => Ok(Rc::new(BestRouteStrategy::default())),
        other => Err(ForwarderError::UnknownStrategy(other.to_string())),
    }
}
