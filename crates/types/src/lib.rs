//! Core value types for the momentum ledger.
//!
//! This crate provides the foundational types shared across the node:
//!
//! - **Primitives**: [`Hash`], the 32-byte blake3 identifier
//! - **Identifiers**: [`PeerId`]
//! - **Ledger types**: [`Momentum`], [`DetailedMomentum`], [`AccountBlock`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. All types
//! are deep-immutable value containers: once decoded from the wire they are
//! only read, cloned and hashed.

mod hash;
mod identifiers;
mod momentum;

pub use hash::{Hash, HexError};
pub use identifiers::PeerId;
pub use momentum::{AccountBlock, DetailedMomentum, Momentum};
