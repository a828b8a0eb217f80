//! Metrics facade for the momentum node.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific methods and
//! default no-op implementations. A global singleton recorder is accessed via
//! `recorder()`, and convenience free functions delegate to it.
//!
//! # Usage
//!
//! Callers record metrics via free functions:
//! ```ignore
//! momentum_metrics::record_momentum_imported(height);
//! momentum_metrics::record_announce_dropped("hash_limit");
//! ```
//!
//! At startup, install a backend with [`set_global_recorder`]. When no
//! backend is installed, every call is a no-op.

use std::sync::OnceLock;

// ═══════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so backends only need
/// to override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync + 'static {
    // ── Announcements ────────────────────────────────────────────────

    /// Record an accepted momentum announcement.
    fn record_announce_accepted(&self) {}

    /// Record a dropped momentum announcement, by reason.
    fn record_announce_dropped(&self, reason: &str) {}

    /// Record an announced hash whose fetch window expired unanswered.
    fn record_fetch_expired(&self) {}

    /// Record an explicit retrieval dispatched to one peer.
    fn record_fetch_dispatched(&self, hash_count: usize) {}

    // ── Import queue ─────────────────────────────────────────────────

    /// Record a momentum admitted to the import queue.
    fn record_momentum_queued(&self) {}

    /// Record a momentum discarded before queueing, by reason.
    fn record_momentum_discarded(&self, reason: &str) {}

    /// Set the import queue depth gauge.
    fn set_import_queue_depth(&self, depth: usize) {}

    // ── Import ───────────────────────────────────────────────────────

    /// Record a momentum imported into the local chain.
    fn record_momentum_imported(&self, height: u64) {}

    /// Record a failed chain insert.
    fn record_import_failed(&self) {}

    /// Record a peer dropped for misbehaviour.
    fn record_peer_dropped(&self) {}
}

// ═══════════════════════════════════════════════════════════════════════
// Global singleton
// ═══════════════════════════════════════════════════════════════════════

struct NoopRecorder;
impl MetricsRecorder for NoopRecorder {}

static RECORDER: OnceLock<Box<dyn MetricsRecorder>> = OnceLock::new();

/// Install a global metrics recorder.
///
/// Can only be called once. Subsequent calls are silently ignored.
pub fn set_global_recorder(recorder: Box<dyn MetricsRecorder>) {
    let _ = RECORDER.set(recorder);
}

/// Get the global metrics recorder.
///
/// Returns a no-op recorder if none has been installed.
#[inline]
fn recorder() -> &'static dyn MetricsRecorder {
    RECORDER.get().map(|r| r.as_ref()).unwrap_or(&NoopRecorder)
}

// ═══════════════════════════════════════════════════════════════════════
// Convenience free functions
// ═══════════════════════════════════════════════════════════════════════

// ── Announcements ────────────────────────────────────────────────────

/// Record an accepted momentum announcement.
#[inline]
pub fn record_announce_accepted() {
    recorder().record_announce_accepted();
}

/// Record a dropped momentum announcement, by reason.
#[inline]
pub fn record_announce_dropped(reason: &str) {
    recorder().record_announce_dropped(reason);
}

/// Record an announced hash whose fetch window expired unanswered.
#[inline]
pub fn record_fetch_expired() {
    recorder().record_fetch_expired();
}

/// Record an explicit retrieval dispatched to one peer.
#[inline]
pub fn record_fetch_dispatched(hash_count: usize) {
    recorder().record_fetch_dispatched(hash_count);
}

// ── Import queue ─────────────────────────────────────────────────────

/// Record a momentum admitted to the import queue.
#[inline]
pub fn record_momentum_queued() {
    recorder().record_momentum_queued();
}

/// Record a momentum discarded before queueing, by reason.
#[inline]
pub fn record_momentum_discarded(reason: &str) {
    recorder().record_momentum_discarded(reason);
}

/// Set the import queue depth gauge.
#[inline]
pub fn set_import_queue_depth(depth: usize) {
    recorder().set_import_queue_depth(depth);
}

// ── Import ───────────────────────────────────────────────────────────

/// Record a momentum imported into the local chain.
#[inline]
pub fn record_momentum_imported(height: u64) {
    recorder().record_momentum_imported(height);
}

/// Record a failed chain insert.
#[inline]
pub fn record_import_failed() {
    recorder().record_import_failed();
}

/// Record a peer dropped for misbehaviour.
#[inline]
pub fn record_peer_dropped() {
    recorder().record_peer_dropped();
}
