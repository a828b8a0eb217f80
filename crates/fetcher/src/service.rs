//! The fetcher service: public façade and event loop.
//!
//! [`Fetcher`] owns the ingress channel senders and the quit token; the
//! private [`EventLoop`] owns the receivers and every piece of mutable
//! state. All state-touching operations are routed through the channels so
//! the loop task is the sole mutator — no lock guards core state.
//!
//! ```text
//! ┌───────────┐  notify/inject/filter  ┌────────────┐  spawn   ┌───────────────┐
//! │  Fetcher  │───────────────────────►│ EventLoop  │─────────►│ import worker │
//! │ (façade)  │                        │ (owns all  │          │ (one / block) │
//! └───────────┘                        │   state)   │◄─────────┴───────────────┘
//!                                      └────────────┘   done
//! ```
//!
//! Auxiliary work — import, fetch dispatch, broadcast — runs as detached
//! tasks that report back through the `done` channel. On `stop` the loop
//! returns immediately; in-flight workers finish on their own and their
//! completion signals are dropped with the loop.

use crate::announce::{Announce, Inject};
use crate::chain::{Chain, MomentumRequester, Relay};
use crate::config::FetcherConfig;
use crate::error::Terminated;
use crate::state::{FetcherState, NotifyOutcome};
use crate::status::FetcherStatus;
use arc_swap::ArcSwap;
use momentum_metrics as metrics;
use momentum_types::{DetailedMomentum, Hash, Momentum, PeerId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Testing hook invoked with the hash group of every dispatched fetch.
pub type FetchingHook = Arc<dyn Fn(&[Hash]) + Send + Sync>;

/// Testing hook invoked after every successful momentum import.
pub type ImportedHook = Arc<dyn Fn(&Momentum) + Send + Sync>;

/// Capacity of the `done` channel. Its only senders are import workers
/// spawned by the loop itself, so depth is bounded by in-flight imports.
const DONE_CHANNEL_CAPACITY: usize = 64;

/// The filter rendezvous carried over the filter channel: the caller hands
/// the batch in through `batch_rx` and takes the unsolicited remainder back
/// through `reply_tx`.
struct FilterRendezvous {
    batch_rx: oneshot::Receiver<Vec<DetailedMomentum>>,
    reply_tx: oneshot::Sender<Vec<DetailedMomentum>>,
}

/// Accumulates momentum announcements from peers and schedules them for
/// retrieval and ordered import.
///
/// Construct with [`Fetcher::new`], optionally install test hooks, then
/// [`start`](Fetcher::start) the loop. All submission methods suspend at
/// most once, at the send into the loop, and resolve to [`Terminated`]
/// once [`stop`](Fetcher::stop) has been called.
pub struct Fetcher {
    notify_tx: mpsc::Sender<Announce>,
    inject_tx: mpsc::Sender<Inject>,
    filter_tx: mpsc::Sender<FilterRendezvous>,
    quit: CancellationToken,
    status: Arc<ArcSwap<FetcherStatus>>,
    /// The loop, parked here between `new` and `start`.
    event_loop: Mutex<Option<EventLoop>>,
}

impl Fetcher {
    /// Create a fetcher over the injected chain and relay seams.
    pub fn new(config: FetcherConfig, chain: Arc<dyn Chain>, relay: Arc<dyn Relay>) -> Self {
        // Rendezvous-style ingress: capacity 1 keeps producers suspended
        // while the loop is busy, bounding in-flight events.
        let (notify_tx, notify_rx) = mpsc::channel(1);
        let (inject_tx, inject_rx) = mpsc::channel(1);
        let (filter_tx, filter_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = mpsc::channel(DONE_CHANNEL_CAPACITY);
        let quit = CancellationToken::new();
        let status = Arc::new(ArcSwap::from_pointee(FetcherStatus::default()));

        let event_loop = EventLoop {
            state: FetcherState::new(&config),
            config,
            chain,
            relay,
            notify_rx,
            inject_rx,
            filter_rx,
            done_rx,
            done_tx,
            quit: quit.clone(),
            status: Arc::clone(&status),
            fetch_deadline: None,
            fetching_hook: None,
            imported_hook: None,
        };

        Self {
            notify_tx,
            inject_tx,
            filter_tx,
            quit,
            status,
            event_loop: Mutex::new(Some(event_loop)),
        }
    }

    /// Install the fetch-dispatch testing hook. Effective only before
    /// [`start`](Fetcher::start).
    pub fn set_fetching_hook(&self, hook: impl Fn(&[Hash]) + Send + Sync + 'static) {
        if let Some(event_loop) = self.event_loop.lock().expect("fetcher poisoned").as_mut() {
            event_loop.fetching_hook = Some(Arc::new(hook));
        }
    }

    /// Install the import testing hook. Effective only before
    /// [`start`](Fetcher::start).
    pub fn set_imported_hook(&self, hook: impl Fn(&Momentum) + Send + Sync + 'static) {
        if let Some(event_loop) = self.event_loop.lock().expect("fetcher poisoned").as_mut() {
            event_loop.imported_hook = Some(Arc::new(hook));
        }
    }

    /// Launch the event loop task. Subsequent calls are no-ops.
    pub fn start(&self) {
        if let Some(event_loop) = self.event_loop.lock().expect("fetcher poisoned").take() {
            tokio::spawn(event_loop.run());
        }
    }

    /// Signal termination. The loop returns at its next suspension point;
    /// in-flight import workers finish on their own.
    pub fn stop(&self) {
        self.quit.cancel();
    }

    /// Announce the potential availability of a momentum in the network.
    pub async fn notify(
        &self,
        peer: PeerId,
        hash: Hash,
        timestamp: Instant,
        fetch: MomentumRequester,
    ) -> Result<(), Terminated> {
        let announce = Announce {
            hash,
            timestamp,
            origin: peer,
            fetch,
        };
        tokio::select! {
            biased;
            _ = self.quit.cancelled() => Err(Terminated),
            res = self.notify_tx.send(announce) => res.map_err(|_| Terminated),
        }
    }

    /// Offer a momentum for direct import, filling gaps in the future
    /// import queue.
    pub async fn enqueue(&self, peer: PeerId, detailed: DetailedMomentum) -> Result<(), Terminated> {
        let op = Inject {
            origin: peer,
            detailed,
        };
        tokio::select! {
            biased;
            _ = self.quit.cancelled() => Err(Terminated),
            res = self.inject_tx.send(op) => res.map_err(|_| Terminated),
        }
    }

    /// Extract the momenta the fetcher explicitly requested from a freshly
    /// received batch, returning the rest for the downloader.
    ///
    /// Internally this is three handshakes on a dedicated channel pair —
    /// hand over the reply channel, send the batch, receive the unsolicited
    /// subset — and the order is a contract with the loop. On termination
    /// an empty batch is returned from whichever step was pending.
    pub async fn filter(&self, momenta: Vec<DetailedMomentum>) -> Vec<DetailedMomentum> {
        let (batch_tx, batch_rx) = oneshot::channel();
        let (reply_tx, reply_rx) = oneshot::channel();

        // Hand the reply channel to the fetcher.
        let rendezvous = FilterRendezvous { batch_rx, reply_tx };
        tokio::select! {
            biased;
            _ = self.quit.cancelled() => return Vec::new(),
            res = self.filter_tx.send(rendezvous) => {
                if res.is_err() {
                    return Vec::new();
                }
            }
        }

        // Request the filtering of the momentum batch.
        if batch_tx.send(momenta).is_err() {
            return Vec::new();
        }

        // Retrieve the momenta remaining after filtering.
        tokio::select! {
            biased;
            _ = self.quit.cancelled() => Vec::new(),
            reply = reply_rx => reply.unwrap_or_default(),
        }
    }

    /// Latest status snapshot published by the loop.
    pub fn status(&self) -> FetcherStatus {
        self.status.load().as_ref().clone()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Event loop
// ═══════════════════════════════════════════════════════════════════════

/// The single-owner event loop. Holds every table, the import queue and
/// the fetch timer; see the module docs for the task topology.
struct EventLoop {
    config: FetcherConfig,
    state: FetcherState,
    chain: Arc<dyn Chain>,
    relay: Arc<dyn Relay>,

    notify_rx: mpsc::Receiver<Announce>,
    inject_rx: mpsc::Receiver<Inject>,
    filter_rx: mpsc::Receiver<FilterRendezvous>,
    done_rx: mpsc::Receiver<Hash>,
    /// Cloned into every import worker.
    done_tx: mpsc::Sender<Hash>,
    quit: CancellationToken,

    status: Arc<ArcSwap<FetcherStatus>>,
    /// Absolute deadline of the next explicit fetch; `None` while nothing
    /// is announced.
    fetch_deadline: Option<Instant>,

    fetching_hook: Option<FetchingHook>,
    imported_hook: Option<ImportedHook>,
}

impl EventLoop {
    async fn run(mut self) {
        debug!("Fetcher event loop starting");
        loop {
            if self.quit.is_cancelled() {
                debug!("Fetcher event loop terminating");
                return;
            }

            // Clean up any expired momentum fetches.
            self.state.expire_fetching(Instant::now());

            // Import any queued momenta that could potentially fit.
            self.drain_import_queue();

            self.status.store(Arc::new(self.state.status()));

            // Wait for an outside event to occur. Priority order: quit, the
            // fetch timer, worker completions, then network ingress.
            tokio::select! {
                biased;
                _ = self.quit.cancelled() => {
                    debug!("Fetcher event loop terminating");
                    return;
                }
                _ = Self::until(self.fetch_deadline) => self.on_fetch_timer(),
                Some(hash) = self.done_rx.recv() => {
                    // A pending import finished; remove every trace of it.
                    self.state.forget_hash(&hash);
                    self.state.forget_block(&hash);
                }
                Some(announce) = self.notify_rx.recv() => self.on_notify(announce),
                Some(op) = self.inject_rx.recv() => self.on_inject(op),
                Some(rendezvous) = self.filter_rx.recv() => self.on_filter(rendezvous).await,
                else => return,
            }
        }
    }

    /// Sleep until an absolute deadline; pend forever while unset.
    async fn until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// A momentum was announced; schedule it unless the peer is over quota
    /// or the hash is already being fetched.
    fn on_notify(&mut self, announce: Announce) {
        if let NotifyOutcome::Scheduled { first: true } = self.state.on_notify(announce) {
            self.reschedule();
        }
    }

    /// A direct momentum insertion was requested.
    fn on_inject(&mut self, op: Inject) {
        let height = self.chain.chain_height();
        self.state.enqueue(op.origin, op.detailed, height);
    }

    /// At least one announcement's grace period ran out; request every due
    /// hash from one randomly chosen announcer each.
    fn on_fetch_timer(&mut self) {
        let now = Instant::now();

        // Group due hashes by the chosen announcer so near-simultaneous
        // expiries coalesce into one request per peer.
        let mut request: HashMap<PeerId, (MomentumRequester, Vec<Hash>)> = HashMap::new();
        for announce in self.state.take_due_announces(now) {
            // Skip momenta that arrived through another path meanwhile.
            if self.chain.get_momentum(&announce.hash).is_some() {
                continue;
            }
            let slot = request
                .entry(announce.origin.clone())
                .or_insert_with(|| (Arc::clone(&announce.fetch), Vec::new()));
            slot.1.push(announce.hash);
            self.state.mark_fetching(announce);
        }

        // Send out all momentum requests from detached tasks; the loop
        // never awaits the transport.
        for (peer, (fetch, hashes)) in request {
            debug!(peer = %peer, hashes = ?hashes, "Fetching announced momenta");
            metrics::record_fetch_dispatched(hashes.len());
            let hook = self.fetching_hook.clone();
            tokio::spawn(async move {
                if let Some(hook) = hook {
                    hook(&hashes);
                }
                if let Err(err) = fetch(hashes) {
                    // Best effort: an unanswered hash ages out of the
                    // fetching table after the fetch timeout.
                    debug!(peer = %peer, reason = %err, "Momentum request failed");
                }
            });
        }

        // Schedule the next fetch if announcements are still pending.
        self.reschedule();
    }

    /// Momenta arrived from the network; keep what was explicitly
    /// requested and hand the rest back to the caller.
    async fn on_filter(&mut self, rendezvous: FilterRendezvous) {
        let FilterRendezvous { batch_rx, reply_tx } = rendezvous;

        // Receive the batch; a pending quit aborts the handshake and the
        // next loop iteration exits.
        let batch = tokio::select! {
            biased;
            _ = self.quit.cancelled() => return,
            res = batch_rx => match res {
                Ok(batch) => batch,
                Err(_) => return,
            },
        };

        let chain = Arc::clone(&self.chain);
        let (explicit, download) = self
            .state
            .filter_batch(batch, |hash| chain.get_momentum(hash).is_some());

        // Hand everything unsolicited back; a vanished caller does not
        // affect the solicited imports below.
        let _ = reply_tx.send(download);

        // Schedule the retrieved momenta for ordered import.
        for detailed in explicit {
            if let Some(origin) = self.state.fetching_origin(&detailed.hash()) {
                let height = self.chain.chain_height();
                self.state.enqueue(origin, detailed, height);
            }
        }
    }

    /// Re-arm the fetch timer to the earliest pending announcement's
    /// deadline, or disarm it when nothing is announced.
    fn reschedule(&mut self) {
        self.fetch_deadline = self
            .state
            .earliest_announce()
            .map(|earliest| earliest + self.config.arrive_timeout);
    }

    /// Pop queued momenta that fit next to the chain head and spawn an
    /// import worker for each.
    fn drain_import_queue(&mut self) {
        let height = self.chain.chain_height();
        while let Some(entry) = self.state.pop_queue() {
            // Too far ahead: put it back and retry on a later iteration.
            if entry.height > height + 1 {
                self.state.requeue(entry);
                break;
            }
            // Lazily deleted key: the payload is gone.
            let Some(op) = self.state.queued_inject(&entry.hash).cloned() else {
                continue;
            };
            // Stale, or already imported by other means.
            if entry.height + self.config.max_uncle_dist < height
                || self.chain.get_momentum(&entry.hash).is_some()
            {
                self.state.forget_block(&entry.hash);
                continue;
            }
            self.spawn_import(op);
        }
        metrics::set_import_queue_depth(self.state.import_queue_depth());
    }

    /// Run one momentum import on a detached worker task.
    ///
    /// The completion signal reaches the loop on every exit path: the
    /// worker body is a single async call whose early returns all converge
    /// on the `done` send below it.
    fn spawn_import(&self, op: Inject) {
        let hash = op.detailed.hash();
        info!(peer = %op.origin, height = op.detailed.height(), %hash, "Importing momentum");

        let chain = Arc::clone(&self.chain);
        let relay = Arc::clone(&self.relay);
        let done_tx = self.done_tx.clone();
        let imported_hook = self.imported_hook.clone();
        tokio::spawn(async move {
            import_momentum(chain, relay, op, imported_hook).await;
            // If the loop is gone the send fails, which is fine: nobody is
            // left to clean up for.
            let _ = done_tx.send(hash).await;
        });
    }
}

/// Validate, propagate and insert a single momentum.
async fn import_momentum(
    chain: Arc<dyn Chain>,
    relay: Arc<dyn Relay>,
    op: Inject,
    imported_hook: Option<ImportedHook>,
) {
    let momentum = op.detailed.momentum.clone();
    let hash = momentum.hash();

    // A missing parent means out-of-order delivery; the downloader heals
    // the gap, so drop silently.
    let Some(parent) = chain.get_momentum(&momentum.previous_hash) else {
        debug!(%hash, height = momentum.height, "Momentum parent unknown, discarding");
        return;
    };

    // Quickly validate the header, and propagate the momentum if it passes.
    if let Err(err) = chain.validate_momentum(&momentum, &parent.momentum) {
        info!(
            peer = %op.origin,
            height = momentum.height,
            %hash,
            reason = %err,
            "Momentum verification failed"
        );
        metrics::record_peer_dropped();
        relay.drop_peer(&op.origin);
        return;
    }
    {
        let relay = Arc::clone(&relay);
        let detailed = op.detailed.clone();
        tokio::spawn(async move { relay.broadcast_momentum(&detailed, true) });
    }

    // Run the actual import and log any issues.
    if let Err(err) = chain.insert_chain(std::slice::from_ref(&op.detailed)) {
        warn!(
            peer = %op.origin,
            height = momentum.height,
            %hash,
            reason = %err,
            "Momentum import failed"
        );
        metrics::record_import_failed();
        return;
    }
    metrics::record_momentum_imported(momentum.height);

    // Announce availability to the rest of the network.
    {
        let relay = Arc::clone(&relay);
        let detailed = op.detailed.clone();
        tokio::spawn(async move { relay.broadcast_momentum(&detailed, false) });
    }

    if let Some(hook) = imported_hook {
        hook(&momentum);
    }
}
