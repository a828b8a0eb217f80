//! In-memory chain and relay doubles for fetcher integration tests.

use momentum_fetcher::{Chain, ChainError, Relay};
use momentum_types::{AccountBlock, DetailedMomentum, Hash, Momentum, PeerId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Build a detailed momentum at the given position.
pub fn momentum_at(height: u64, previous_hash: Hash) -> DetailedMomentum {
    DetailedMomentum {
        momentum: Momentum {
            version: 1,
            chain_id: 1,
            previous_hash,
            height,
            timestamp: 1_700_000_000_000 + height,
            content_root: Hash::ZERO,
        },
        account_blocks: vec![AccountBlock {
            hash: Hash::from_bytes(&height.to_le_bytes()),
            height: 1,
            payload: vec![],
        }],
    }
}

/// Build the direct child of a momentum.
pub fn child_of(parent: &DetailedMomentum) -> DetailedMomentum {
    momentum_at(parent.height() + 1, parent.hash())
}

/// In-memory chain double with scriptable height and validation behaviour.
#[derive(Default)]
pub struct MockChain {
    height: AtomicU64,
    momenta: Mutex<HashMap<Hash, DetailedMomentum>>,
    inserted: Mutex<Vec<DetailedMomentum>>,
    invalid: Mutex<HashSet<Hash>>,
    insert_failing: Mutex<HashSet<Hash>>,
}

impl MockChain {
    pub fn new(height: u64) -> Self {
        Self {
            height: AtomicU64::new(height),
            ..Self::default()
        }
    }

    /// Pre-seed a momentum without recording it as an insert.
    pub fn seed(&self, detailed: DetailedMomentum) {
        self.momenta
            .lock()
            .unwrap()
            .insert(detailed.hash(), detailed);
    }

    /// Move the chain head.
    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Make validation reject a specific momentum.
    pub fn mark_invalid(&self, hash: Hash) {
        self.invalid.lock().unwrap().insert(hash);
    }

    /// Make `insert_chain` fail for a specific momentum.
    pub fn mark_insert_failing(&self, hash: Hash) {
        self.insert_failing.lock().unwrap().insert(hash);
    }

    /// Everything that went through `insert_chain`, in order.
    pub fn inserted(&self) -> Vec<DetailedMomentum> {
        self.inserted.lock().unwrap().clone()
    }
}

impl Chain for MockChain {
    fn get_momentum(&self, hash: &Hash) -> Option<DetailedMomentum> {
        self.momenta.lock().unwrap().get(hash).cloned()
    }

    fn chain_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    fn validate_momentum(&self, momentum: &Momentum, _parent: &Momentum) -> Result<(), ChainError> {
        if self.invalid.lock().unwrap().contains(&momentum.hash()) {
            return Err(ChainError::Validation("scripted rejection".into()));
        }
        Ok(())
    }

    fn insert_chain(&self, batch: &[DetailedMomentum]) -> Result<usize, ChainError> {
        let mut momenta = self.momenta.lock().unwrap();
        let mut inserted = self.inserted.lock().unwrap();
        for (index, detailed) in batch.iter().enumerate() {
            if self.insert_failing.lock().unwrap().contains(&detailed.hash()) {
                return Err(ChainError::Insert {
                    index,
                    reason: "scripted insert failure".into(),
                });
            }
            momenta.insert(detailed.hash(), detailed.clone());
            self.height.fetch_max(detailed.height(), Ordering::SeqCst);
            inserted.push(detailed.clone());
        }
        Ok(batch.len())
    }
}

/// Relay double recording broadcasts and peer drops.
#[derive(Default)]
pub struct MockRelay {
    broadcasts: Mutex<Vec<(Hash, bool)>>,
    dropped: Mutex<Vec<PeerId>>,
}

impl MockRelay {
    /// Recorded `(hash, propagate)` broadcast calls.
    pub fn broadcasts(&self) -> Vec<(Hash, bool)> {
        self.broadcasts.lock().unwrap().clone()
    }

    /// Recorded peer drops, in order.
    pub fn dropped(&self) -> Vec<PeerId> {
        self.dropped.lock().unwrap().clone()
    }
}

impl Relay for MockRelay {
    fn broadcast_momentum(&self, detailed: &DetailedMomentum, propagate: bool) {
        self.broadcasts
            .lock()
            .unwrap()
            .push((detailed.hash(), propagate));
    }

    fn drop_peer(&self, peer: &PeerId) {
        self.dropped.lock().unwrap().push(peer.clone());
    }
}
