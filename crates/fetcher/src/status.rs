//! Fetcher status snapshot for external APIs.

use serde::Serialize;

/// Point-in-time view of the fetcher's tables.
///
/// Published by the event loop after every iteration and readable at any
/// time through [`Fetcher::status`](crate::Fetcher::status) without touching
/// loop state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetcherStatus {
    /// Hashes announced and awaiting their fetch window.
    pub announced_hashes: usize,
    /// Hashes currently being fetched.
    pub fetching_hashes: usize,
    /// Momenta queued for import.
    pub queued_momenta: usize,
    /// Peers with outstanding announcements.
    pub announcing_peers: usize,
    /// Peers with queued momenta.
    pub queueing_peers: usize,
    /// Entries in the import queue, including lazily deleted ones.
    pub import_queue_depth: usize,
}

impl FetcherStatus {
    /// True when no hash is mid-flight in any table.
    pub fn is_idle(&self) -> bool {
        self.announced_hashes == 0 && self.fetching_hashes == 0 && self.queued_momenta == 0
    }
}
