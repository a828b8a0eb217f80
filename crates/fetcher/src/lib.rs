//! Announcement-driven momentum fetcher.
//!
//! Pulls newly produced momenta from peers into the local chain. Peers
//! announce hashes; after a short grace period the fetcher explicitly
//! requests each still-missing momentum from one randomly chosen announcer,
//! queues deliveries in height order, and imports whatever fits next to the
//! chain head. Per-peer allowances bound how much state any single peer can
//! pin, and a misbehaving peer (one whose momentum fails validation) is
//! dropped.
//!
//! # Architecture
//!
//! A single long-lived task owns every table and the import queue; all
//! ingress goes through rendezvous channels, so no lock guards core state.
//!
//! ```text
//!  notify ───┐
//!  inject ───┤                          ┌───────────────┐
//!  filter ───┼──► event loop ── spawn ──│ import worker │──► insert_chain
//!  done   ───┤   (sole mutator)         └──────┬────────┘
//!  timer  ───┘        ▲                        │
//!                     └──────── done ──────────┘
//! ```
//!
//! Long-range catch-up is out of scope: anything the fetcher did not
//! explicitly request is handed back through [`Fetcher::filter`] for the
//! downloader to handle.

mod announce;
mod chain;
mod config;
mod error;
mod queue;
mod service;
mod state;
mod status;

pub use chain::{Chain, ChainError, MomentumRequester, Relay, RequestError};
pub use config::FetcherConfig;
pub use error::Terminated;
pub use service::{Fetcher, FetchingHook, ImportedHook};
pub use status::FetcherStatus;
