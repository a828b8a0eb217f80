//! Collaborator seams injected into the fetcher at construction.
//!
//! The fetcher has no wire or on-disk surface of its own. Its boundary is
//! the trait pair below plus the per-announce [`MomentumRequester`]: the
//! chain side answers lookups and accepts inserts, the relay side owns
//! propagation and peer lifecycle. Implementations must be safe to call from
//! any task — the fetcher holds no lock across these calls and makes no
//! claim on their internal serialisation.

use momentum_types::{DetailedMomentum, Hash, Momentum, PeerId};
use std::sync::Arc;

/// Error returned when a momentum retrieval request fails.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The peer is no longer connected.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(PeerId),

    /// The transport is shutting down.
    #[error("network shutting down")]
    Shutdown,
}

/// Errors surfaced by the local chain.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Header validation failed. Any validation error means whoever sent
    /// the momentum is misbehaving.
    #[error("momentum validation failed: {0}")]
    Validation(String),

    /// An ordered insert failed partway through a batch.
    #[error("chain insert failed at index {index}: {reason}")]
    Insert {
        /// Index of the first momentum that failed to insert.
        index: usize,
        /// Description of the failure.
        reason: String,
    },
}

/// One-shot retrieval request bound to the announcing peer's connection.
///
/// Captured at announcement time because only the transport knows how to
/// reach that specific peer. The fetcher invokes it from a detached task and
/// never awaits a response — delivery comes back through
/// [`Fetcher::filter`](crate::Fetcher::filter).
pub type MomentumRequester = Arc<dyn Fn(Vec<Hash>) -> Result<(), RequestError> + Send + Sync>;

/// Local-chain interface.
pub trait Chain: Send + Sync {
    /// Look up a momentum in the local chain.
    fn get_momentum(&self, hash: &Hash) -> Option<DetailedMomentum>;

    /// Current local chain head height.
    fn chain_height(&self) -> u64;

    /// Stateless header validation against the parent momentum.
    fn validate_momentum(&self, momentum: &Momentum, parent: &Momentum) -> Result<(), ChainError>;

    /// Ordered append of a momentum batch. Returns the number of momenta
    /// inserted; the failing index is carried in [`ChainError::Insert`].
    fn insert_chain(&self, batch: &[DetailedMomentum]) -> Result<usize, ChainError>;
}

/// Transport-side interface.
pub trait Relay: Send + Sync {
    /// Relay a momentum to connected peers. `propagate = true` sends the
    /// full momentum, `false` announces the hash only.
    fn broadcast_momentum(&self, detailed: &DetailedMomentum, propagate: bool);

    /// Disconnect and blacklist a misbehaving peer.
    fn drop_peer(&self, peer: &PeerId);
}
