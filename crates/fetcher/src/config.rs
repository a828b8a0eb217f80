//! Fetcher configuration.

use std::time::Duration;

/// Tuning knobs of the announcement fetcher.
///
/// The defaults are the protocol values; deployments rarely change them
/// outside of tests.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Grace period after an announcement before the momentum is explicitly
    /// requested.
    pub arrive_timeout: Duration,

    /// Batching window subtracted from `arrive_timeout` so near-expired
    /// announces from the same peer coalesce into a single request.
    pub gather_slack: Duration,

    /// Maximum wait for an explicitly requested momentum before giving up
    /// on the chosen peer.
    pub fetch_timeout: Duration,

    /// Maximum allowed backward distance from the chain head. Older momenta
    /// are discarded.
    pub max_uncle_dist: u64,

    /// Maximum allowed forward distance from the chain head to queue.
    pub max_queue_dist: u64,

    /// Maximum number of unique momenta a peer may have announced.
    pub hash_limit: usize,

    /// Maximum number of unique momenta a peer may have delivered into the
    /// import queue.
    pub block_limit: usize,

    /// Seed for the announcer-choice RNG. `None` seeds from entropy; tests
    /// set this to make the peer pick deterministic.
    pub rng_seed: Option<u64>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            arrive_timeout: Duration::from_millis(500),
            gather_slack: Duration::from_millis(100),
            fetch_timeout: Duration::from_secs(5),
            max_uncle_dist: 7,
            max_queue_dist: 32,
            hash_limit: 256,
            block_limit: 64,
            rng_seed: None,
        }
    }
}
