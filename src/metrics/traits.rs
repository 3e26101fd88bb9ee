//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and export are separate, small traits, so the cache
//! engine only ever writes counters and never knows who reads them.
//!
//! ```text
//!                  ┌─────────────────────────────┐
//!                  │     CoreMetricsRecorder     │
//!                  │  get_hit/get_miss/insert    │
//!                  │  evicted_entry/clear        │
//!                  └──────────────┬──────────────┘
//!                                 │
//!                                 ▼
//!                  ┌─────────────────────────────┐     ┌──────────────────────────────┐
//!                  │   RefcountMetricsRecorder   │     │ RefcountMetricsReadRecorder  │
//!                  │  revival/release/finalize/  │     │  peek (&self, via cells)     │
//!                  │  reject/leak                │     └──────────────────────────────┘
//!                  └─────────────────────────────┘
//!
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (bench/test)                 │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```

/// Common counters for any cache.
pub trait CoreMetricsRecorder {
    fn record_get_hit(&mut self);
    fn record_get_miss(&mut self);
    fn record_insert_call(&mut self);
    fn record_insert_new(&mut self);
    fn record_evicted_entry(&mut self);
    fn record_clear(&mut self);
}

/// Metrics specific to refcounted pinning and clean/dirty availability.
pub trait RefcountMetricsRecorder: CoreMetricsRecorder {
    /// An available entry was pinned again by a fetch.
    fn record_revival(&mut self);
    /// An insert reclaimed a slot that held another item.
    fn record_insert_reused(&mut self);
    fn record_insert_full(&mut self);
    fn record_insert_duplicate(&mut self);
    fn record_evicted_clean(&mut self);
    fn record_evicted_dirty(&mut self);
    fn record_release_call(&mut self);
    fn record_release_to_clean(&mut self);
    fn record_release_to_dirty(&mut self);
    fn record_release_untracked(&mut self);
    fn record_release_underflow(&mut self);
    fn record_finalized(&mut self);
    fn record_leaked_pin(&mut self);
}

/// Read-only metrics for &self methods (uses interior mutability).
pub trait RefcountMetricsReadRecorder {
    fn record_peek_call(&self);
    fn record_peek_found(&self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
