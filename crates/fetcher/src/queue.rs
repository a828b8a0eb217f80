//! Height-ordered import queue.

use momentum_types::Hash;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Key of a pending import: the lowest height pops first, the hash breaks
/// ties deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct QueueEntry {
    pub height: u64,
    pub hash: Hash,
}

/// Min-first priority queue over pending imports.
///
/// Stores keys only; the owning state keeps the payloads in its `queued`
/// table. A popped key whose hash is no longer in that table is stale and
/// must be skipped (lazy deletion).
#[derive(Debug, Default)]
pub(crate) struct ImportQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
}

impl ImportQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Add a pending import key.
    pub fn push(&mut self, height: u64, hash: Hash) {
        self.heap.push(Reverse(QueueEntry { height, hash }));
    }

    /// Remove and return the lowest-height key.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    /// Number of keys, including lazily deleted ones.
    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(tag: u8) -> Hash {
        Hash::from_bytes(&[tag])
    }

    #[test]
    fn test_pops_lowest_height_first() {
        let mut queue = ImportQueue::new();
        queue.push(30, hash(3));
        queue.push(10, hash(1));
        queue.push(20, hash(2));

        assert_eq!(queue.pop().map(|e| e.height), Some(10));
        assert_eq!(queue.pop().map(|e| e.height), Some(20));
        assert_eq!(queue.pop().map(|e| e.height), Some(30));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_equal_heights_break_ties_by_hash() {
        let mut queue = ImportQueue::new();
        let (a, b) = (hash(1), hash(2));
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        queue.push(5, hi);
        queue.push(5, lo);

        assert_eq!(queue.pop().map(|e| e.hash), Some(lo));
        assert_eq!(queue.pop().map(|e| e.hash), Some(hi));
    }

    #[test]
    fn test_push_back_reorders() {
        let mut queue = ImportQueue::new();
        queue.push(8, hash(8));
        let top = queue.pop().unwrap();
        queue.push(top.height, top.hash);
        queue.push(3, hash(3));

        assert_eq!(queue.pop().map(|e| e.height), Some(3));
        assert_eq!(queue.pop().map(|e| e.height), Some(8));
        assert_eq!(queue.len(), 0);
    }
}
