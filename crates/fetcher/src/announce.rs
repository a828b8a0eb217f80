//! Announcement and injection records.

use crate::chain::MomentumRequester;
use momentum_types::{DetailedMomentum, Hash, PeerId};
use std::fmt;
use tokio::time::Instant;

/// A peer's notification that it holds a momentum with a given hash.
///
/// Immutable once recorded. The captured requester is the only way to turn
/// the announcement into an explicit retrieval, because it is bound to the
/// announcing peer's connection.
#[derive(Clone)]
pub(crate) struct Announce {
    /// Hash of the announced momentum.
    pub hash: Hash,
    /// When the announcement was received.
    pub timestamp: Instant,
    /// Peer originating the notification.
    pub origin: PeerId,
    /// Retrieval callable bound to `origin`'s connection.
    pub fetch: MomentumRequester,
}

impl fmt::Debug for Announce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announce")
            .field("hash", &self.hash)
            .field("origin", &self.origin)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// A momentum scheduled for import, tagged with the delivering peer.
#[derive(Debug, Clone)]
pub(crate) struct Inject {
    /// Peer that delivered the momentum.
    pub origin: PeerId,
    /// The momentum ready for queueing.
    pub detailed: DetailedMomentum,
}
