//! Single-owner fetcher state machine.
//!
//! Pure synchronous state: quota counters, the announcement tables and the
//! height-ordered import queue. The event loop in `service` is the only
//! mutator; nothing here suspends or performs I/O, so every invariant holds
//! at each of the loop's await points.
//!
//! Per-peer bookkeeping: `announces` counts a peer's holdings across both
//! `announced` and `fetching`; `queues` counts its entries in `queued`.
//! Counters are removed when they reach zero.

use crate::announce::{Announce, Inject};
use crate::config::FetcherConfig;
use crate::queue::{ImportQueue, QueueEntry};
use crate::status::FetcherStatus;
use momentum_metrics as metrics;
use momentum_types::{DetailedMomentum, Hash, PeerId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, info};

/// Decision taken on an incoming announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotifyOutcome {
    /// Recorded. `first` is set when the announcement table grew from
    /// empty, meaning the fetch timer must be re-armed.
    Scheduled { first: bool },
    /// The peer is over its announcement allowance.
    QuotaExceeded,
    /// The hash is already being fetched.
    AlreadyFetching,
}

/// Decision taken on a momentum offered for import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueueOutcome {
    /// Admitted to the import queue.
    Queued,
    /// The peer is over its delivery allowance.
    QuotaExceeded,
    /// The momentum is too far from the chain head in either direction.
    DistanceOutOfRange { dist: i64 },
    /// The hash is already queued.
    AlreadyQueued,
}

/// All mutable fetcher state. Owned and mutated exclusively by the event
/// loop task.
pub(crate) struct FetcherState {
    config: FetcherConfig,

    /// Per-peer announce counts, to prevent memory exhaustion.
    announces: HashMap<PeerId, usize>,
    /// Announced momenta, scheduled for fetching.
    announced: HashMap<Hash, Vec<Announce>>,
    /// Announced momenta, currently being fetched.
    fetching: HashMap<Hash, Announce>,

    /// Height-ordered keys of pending imports.
    queue: ImportQueue,
    /// Per-peer queued-momentum counts, to prevent memory exhaustion.
    queues: HashMap<PeerId, usize>,
    /// Payloads of pending imports, keyed by hash (dedups imports).
    queued: HashMap<Hash, Inject>,

    /// Announcer-choice randomness; seedable for deterministic tests.
    rng: ChaCha8Rng,
}

impl FetcherState {
    pub fn new(config: &FetcherConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config: config.clone(),
            announces: HashMap::new(),
            announced: HashMap::new(),
            fetching: HashMap::new(),
            queue: ImportQueue::new(),
            queues: HashMap::new(),
            queued: HashMap::new(),
            rng,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Announcements
    // ═══════════════════════════════════════════════════════════════════

    /// Record an announcement, subject to the per-peer allowance.
    pub fn on_notify(&mut self, announce: Announce) -> NotifyOutcome {
        let count = self.announces.get(&announce.origin).copied().unwrap_or(0) + 1;
        if count > self.config.hash_limit {
            info!(
                peer = %announce.origin,
                limit = self.config.hash_limit,
                "Peer exceeded outstanding announces"
            );
            metrics::record_announce_dropped("hash_limit");
            return NotifyOutcome::QuotaExceeded;
        }
        if self.fetching.contains_key(&announce.hash) {
            metrics::record_announce_dropped("already_fetching");
            return NotifyOutcome::AlreadyFetching;
        }
        self.announces.insert(announce.origin.clone(), count);
        self.announced.entry(announce.hash).or_default().push(announce);
        metrics::record_announce_accepted();
        NotifyOutcome::Scheduled {
            first: self.announced.len() == 1,
        }
    }

    /// Forget fetches that stayed unanswered past the fetch timeout.
    /// Returns the expired hashes.
    pub fn expire_fetching(&mut self, now: Instant) -> Vec<Hash> {
        let expired: Vec<Hash> = self
            .fetching
            .iter()
            .filter(|(_, announce)| {
                now.duration_since(announce.timestamp) > self.config.fetch_timeout
            })
            .map(|(hash, _)| *hash)
            .collect();
        for hash in &expired {
            debug!(%hash, "Momentum retrieval timed out");
            metrics::record_fetch_expired();
            self.forget_hash(hash);
        }
        expired
    }

    /// Drain announcements that are due for explicit retrieval.
    ///
    /// For each due hash one announcer is chosen uniformly at random and all
    /// pending announces for the hash are released. The caller decides,
    /// after a chain lookup, whether to promote the choice via
    /// [`mark_fetching`](Self::mark_fetching).
    pub fn take_due_announces(&mut self, now: Instant) -> Vec<Announce> {
        let cutoff = self.config.arrive_timeout - self.config.gather_slack;
        let mut due: Vec<Hash> = self
            .announced
            .iter()
            .filter(|(_, announces)| now.duration_since(announces[0].timestamp) > cutoff)
            .map(|(hash, _)| *hash)
            .collect();
        // Stable order, so a seeded run draws the same announcer per hash.
        due.sort_unstable();

        let mut chosen = Vec::with_capacity(due.len());
        for hash in due {
            let Some(announces) = self.announced.get(&hash) else {
                continue;
            };
            let pick = announces[self.rng.gen_range(0..announces.len())].clone();
            self.forget_hash(&hash);
            chosen.push(pick);
        }
        chosen
    }

    /// Promote a chosen announce into the fetching table.
    ///
    /// Re-takes the announcer's quota released by
    /// [`take_due_announces`](Self::take_due_announces), so per-peer
    /// counters keep matching holdings across both tables.
    pub fn mark_fetching(&mut self, announce: Announce) {
        *self.announces.entry(announce.origin.clone()).or_insert(0) += 1;
        self.fetching.insert(announce.hash, announce);
    }

    /// Origin of the in-flight fetch for a hash, if any.
    pub fn fetching_origin(&self, hash: &Hash) -> Option<PeerId> {
        self.fetching.get(hash).map(|announce| announce.origin.clone())
    }

    /// Receive time of the earliest pending announcement. Drives the fetch
    /// timer; `None` leaves the timer unset.
    pub fn earliest_announce(&self) -> Option<Instant> {
        self.announced
            .values()
            .map(|announces| announces[0].timestamp)
            .min()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Import queue
    // ═══════════════════════════════════════════════════════════════════

    /// Schedule a momentum for future import, subject to the per-peer
    /// allowance and the distance window around the chain head.
    pub fn enqueue(
        &mut self,
        origin: PeerId,
        detailed: DetailedMomentum,
        chain_height: u64,
    ) -> EnqueueOutcome {
        let hash = detailed.hash();
        let height = detailed.height();

        let count = self.queues.get(&origin).copied().unwrap_or(0) + 1;
        if count > self.config.block_limit {
            info!(
                peer = %origin,
                height,
                %hash,
                limit = self.config.block_limit,
                "Peer exceeded delivered-momentum allowance"
            );
            metrics::record_momentum_discarded("block_limit");
            return EnqueueOutcome::QuotaExceeded;
        }

        let dist = height as i64 - chain_height as i64;
        if dist < -(self.config.max_uncle_dist as i64) || dist > self.config.max_queue_dist as i64 {
            info!(peer = %origin, height, %hash, dist, "Discarded momentum, too far from head");
            metrics::record_momentum_discarded("distance");
            return EnqueueOutcome::DistanceOutOfRange { dist };
        }

        if self.queued.contains_key(&hash) {
            return EnqueueOutcome::AlreadyQueued;
        }
        self.queues.insert(origin.clone(), count);
        self.queued.insert(hash, Inject { origin: origin.clone(), detailed });
        self.queue.push(height, hash);
        metrics::record_momentum_queued();
        debug!(peer = %origin, height, %hash, total = self.queue.len(), "Queued momentum for import");
        EnqueueOutcome::Queued
    }

    /// Remove and return the lowest-height queue key.
    pub fn pop_queue(&mut self) -> Option<QueueEntry> {
        self.queue.pop()
    }

    /// Put a key back (the momentum does not fit the chain head yet).
    pub fn requeue(&mut self, entry: QueueEntry) {
        self.queue.push(entry.height, entry.hash);
    }

    /// Payload of a queued import, if the hash is still queued.
    pub fn queued_inject(&self, hash: &Hash) -> Option<&Inject> {
        self.queued.get(hash)
    }

    /// Entries in the import queue, including lazily deleted ones.
    pub fn import_queue_depth(&self) -> usize {
        self.queue.len()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Filter
    // ═══════════════════════════════════════════════════════════════════

    /// Partition a delivered batch into explicitly requested momenta and
    /// the remainder bound for the downloader.
    ///
    /// A momentum counts as explicit when its hash is being fetched and not
    /// yet queued; if the chain already knows it, the fetch is forgotten
    /// instead.
    pub fn filter_batch(
        &mut self,
        batch: Vec<DetailedMomentum>,
        is_known: impl Fn(&Hash) -> bool,
    ) -> (Vec<DetailedMomentum>, Vec<DetailedMomentum>) {
        let mut explicit = Vec::new();
        let mut download = Vec::new();
        for detailed in batch {
            let hash = detailed.hash();
            if self.fetching.contains_key(&hash) && !self.queued.contains_key(&hash) {
                if is_known(&hash) {
                    self.forget_hash(&hash);
                } else {
                    explicit.push(detailed);
                }
            } else {
                download.push(detailed);
            }
        }
        (explicit, download)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Forgetters
    // ═══════════════════════════════════════════════════════════════════

    /// Remove all traces of a momentum announcement, releasing the
    /// announcers' quotas.
    pub fn forget_hash(&mut self, hash: &Hash) {
        if let Some(announces) = self.announced.remove(hash) {
            for announce in &announces {
                self.release_announce_quota(&announce.origin);
            }
        }
        if let Some(announce) = self.fetching.remove(hash) {
            self.release_announce_quota(&announce.origin);
        }
    }

    /// Remove a queued momentum, releasing the deliverer's quota. The queue
    /// key, if still present, is skipped lazily on pop.
    pub fn forget_block(&mut self, hash: &Hash) {
        if let Some(inject) = self.queued.remove(hash) {
            if let Some(count) = self.queues.get_mut(&inject.origin) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.queues.remove(&inject.origin);
                }
            }
        }
    }

    fn release_announce_quota(&mut self, origin: &PeerId) {
        if let Some(count) = self.announces.get_mut(origin) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.announces.remove(origin);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Introspection
    // ═══════════════════════════════════════════════════════════════════

    /// Snapshot of the table sizes for external APIs.
    pub fn status(&self) -> FetcherStatus {
        FetcherStatus {
            announced_hashes: self.announced.len(),
            fetching_hashes: self.fetching.len(),
            queued_momenta: self.queued.len(),
            announcing_peers: self.announces.len(),
            queueing_peers: self.queues.len(),
            import_queue_depth: self.queue.len(),
        }
    }
}
