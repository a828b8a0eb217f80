//! Momentum and account-block value types.

use crate::Hash;
use sbor::prelude::*;

/// A momentum header: the ledger-level block of the chain.
///
/// The header is what peers announce and validators check. It carries the
/// chain position (height, previous hash), the production time and the
/// commitment to the contained account blocks.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Momentum {
    /// Format version.
    pub version: u64,

    /// Identifier of the chain this momentum belongs to.
    pub chain_id: u64,

    /// Hash of the previous momentum.
    pub previous_hash: Hash,

    /// Height in the momentum ledger (genesis = 0).
    pub height: u64,

    /// Unix timestamp (milliseconds) when the momentum was produced.
    pub timestamp: u64,

    /// Commitment to the contained account blocks.
    pub content_root: Hash,
}

impl Momentum {
    /// Compute the hash of this momentum.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("Momentum serialization should never fail");
        Hash::from_bytes(&bytes)
    }

    /// Check if this is the genesis momentum.
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// An account-chain entry carried inside a detailed momentum.
///
/// A trivial value container from the fetcher's point of view: it is moved
/// around and inserted, never inspected.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct AccountBlock {
    /// Hash of the account block.
    pub hash: Hash,

    /// Height in the owning account chain.
    pub height: u64,

    /// Serialized account-block body.
    pub payload: Vec<u8>,
}

/// A momentum together with its contained account-block payload.
///
/// This is the unit peers deliver over the wire and the unit the chain
/// layer inserts.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct DetailedMomentum {
    /// The momentum header.
    pub momentum: Momentum,

    /// The account blocks the momentum commits to.
    pub account_blocks: Vec<AccountBlock>,
}

impl DetailedMomentum {
    /// Hash of the contained momentum.
    pub fn hash(&self) -> Hash {
        self.momentum.hash()
    }

    /// Height of the contained momentum.
    pub fn height(&self) -> u64 {
        self.momentum.height
    }

    /// Previous-momentum hash of the contained momentum.
    pub fn previous_hash(&self) -> Hash {
        self.momentum.previous_hash
    }
}
