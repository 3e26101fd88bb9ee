//! Refcounted, fixed-capacity cache with clean-before-dirty eviction.
//!
//! Entries are pinned while any caller holds them and become eviction
//! candidates only once every pin is released. Unpinned entries stay
//! fetchable ("revivable") until their slot is actually reclaimed, and slots
//! holding clean items are reclaimed before slots holding dirty ones.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         RefcountCache<I, F>                          │
//!   │                                                                      │
//!   │   BucketTable (chain links)          AvailabilityLists (own links)   │
//!   │   ┌──────────┐                       clean: head ─► [5] [2] [0] ◄─ tail
//!   │   │ bucket 0 │─► [0] ◄─► [4]         dirty: head ─► [3] ◄─ tail      │
//!   │   │ bucket 1 │─► [5]                                                 │
//!   │   │ bucket 2 │─► (empty)                                             │
//!   │   │ bucket 3 │─► [3] ◄─► [1]                                         │
//!   │   └──────────┘                                                       │
//!   │                                                                      │
//!   │   EntrySlab: [0]Avail [1]Pinned(2) [2]Empty [3]Avail(dirty)          │
//!   │              [4]Pinned(1) [5]Avail                                   │
//!   │                                                                      │
//!   │   Finalizer F: receives every item leaving custody                   │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An entry with an item is always in its bucket chain. It is additionally in
//! exactly one availability list while its refcount is zero. Empty slots are
//! in the clean list only, always behind every released entry, so they are
//! consumed before anything is evicted.
//!
//! ## Operations
//!
//! | Operation       | Effect                                                   |
//! |-----------------|----------------------------------------------------------|
//! | `insert`        | bind to the oldest clean, else oldest dirty, slot; pin   |
//! | `fetch`         | pin (reviving an available entry), return `&mut I`       |
//! | `release`       | unpin; at zero, push to the clean or dirty list head     |
//! | `release_owned` | as `release`, or finalize the item if not resident       |
//! | `flush`         | finalize every item, warn on pins, reset to empty        |
//!
//! All of the above are O(1) apart from the bucket-chain scan and `flush`.
//!
//! ## Example
//!
//! ```
//! use refcache::item::Item;
//! use refcache::policy::refcount::{RefcountCache, Release};
//! use refcache::traits::{CacheItem, Cleanliness, FinalizeCause};
//!
//! let mut written = Vec::new();
//! let mut cache = RefcountCache::new(2, |item: Item<u64, &'static str>, _cause: FinalizeCause| {
//!     if item.is_dirty() {
//!         written.push(item.into_value());
//!     }
//! });
//!
//! cache.insert(Item::new(1, "one")).unwrap();
//! cache.insert(Item::new(2, "two")).unwrap();
//!
//! // Modify 2 while holding it, then let go of both.
//! cache.fetch(&2).unwrap().mark_dirty();
//! assert_eq!(cache.release(&2).unwrap(), Release::Pinned { refcount: 1 });
//! assert_eq!(cache.release(&2).unwrap(), Release::Available(Cleanliness::Dirty));
//! assert_eq!(cache.release(&1).unwrap(), Release::Available(Cleanliness::Clean));
//!
//! // Full: the clean entry goes first even though it was released later.
//! let inserted = cache.insert(Item::new(3, "three")).unwrap();
//! assert_eq!(inserted.evicted, Some((1, Cleanliness::Clean)));
//! assert!(cache.contains(&2));
//!
//! drop(cache);
//! assert_eq!(written, vec!["two"]);
//! ```
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use std::fmt;

use tracing::{debug, error, warn};

use crate::ds::availability::AvailabilityLists;
use crate::ds::bucket_table::{BucketHash, BucketTable};
use crate::ds::slot_arena::SlotId;
use crate::error::{ConfigError, InsertError, InvariantError, RefcountUnderflow};
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::RefcountMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::RefcountMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{
    CoreMetricsRecorder, MetricsSnapshotProvider, RefcountMetricsReadRecorder,
    RefcountMetricsRecorder,
};
use crate::store::slab::{EntrySlab, NotPinned, PinState, PinTransition, UnpinTransition};
use crate::traits::{CacheItem, Cleanliness, FinalizeCause, Finalizer};

/// Result of a successful [`RefcountCache::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion<K> {
    /// Slot the new item was bound to.
    pub slot: SlotId,
    /// Key and list of the item evicted to make room, if any.
    pub evicted: Option<(K, Cleanliness)>,
}

/// Result of a successful release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other pins on the entry remain.
    Pinned { refcount: u32 },
    /// The last pin was released; the entry joined this availability list.
    Available(Cleanliness),
    /// The key was not resident.
    Untracked,
}

/// Summary of a [`RefcountCache::flush`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Items handed to the finalizer.
    pub finalized: usize,
    /// Entries that were still pinned, i.e. callers that never released.
    pub leaked_pins: usize,
}

/// Fixed-capacity cache with refcounted pinning and clean-before-dirty LRU
/// eviction among unpinned entries.
pub struct RefcountCache<I: CacheItem, F: Finalizer<I>> {
    slab: EntrySlab<I>,
    buckets: BucketTable,
    available: AvailabilityLists,
    finalizer: F,
    #[cfg(feature = "metrics")]
    metrics: RefcountMetrics,
}

impl<I, F> RefcountCache<I, F>
where
    I: CacheItem,
    F: Finalizer<I>,
{
    /// Creates a cache with `capacity` slots and modulo bucket hashing.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`try_new`](Self::try_new) or the
    /// [`CacheBuilder`](crate::builder::CacheBuilder) for user-supplied values.
    pub fn new(capacity: usize, finalizer: F) -> Self {
        match Self::try_new(capacity, finalizer) {
            Ok(cache) => cache,
            Err(err) => panic!("invalid cache configuration: {}", err),
        }
    }

    /// Fallible constructor for user-configurable capacity.
    pub fn try_new(capacity: usize, finalizer: F) -> Result<Self, ConfigError> {
        Self::try_with_hash(capacity, BucketHash::default(), finalizer)
    }

    /// Fallible constructor choosing the bucket hash.
    pub fn try_with_hash(
        capacity: usize,
        hash: BucketHash,
        finalizer: F,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("capacity must be > 0"));
        }
        Ok(Self {
            slab: EntrySlab::new(capacity),
            buckets: BucketTable::new(capacity, hash),
            available: AvailabilityLists::all_clean(capacity),
            finalizer,
            #[cfg(feature = "metrics")]
            metrics: RefcountMetrics::default(),
        })
    }

    /// Number of slots, fixed at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slab.capacity()
    }

    /// Number of slots holding an item, pinned or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.slab.resident_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slab.resident_len() == 0
    }

    /// Number of entries with a refcount above zero.
    #[inline]
    pub fn pinned_len(&self) -> usize {
        self.slab.pinned_len()
    }

    /// Number of entries in the clean availability list, empty slots included.
    #[inline]
    pub fn available_clean_len(&self) -> usize {
        self.available.len(Cleanliness::Clean)
    }

    #[inline]
    pub fn available_dirty_len(&self) -> usize {
        self.available.len(Cleanliness::Dirty)
    }

    pub fn bucket_hash(&self) -> BucketHash {
        self.buckets.hash()
    }

    pub fn finalizer(&self) -> &F {
        &self.finalizer
    }

    pub fn finalizer_mut(&mut self) -> &mut F {
        &mut self.finalizer
    }

    /// Returns `true` if an entry for `key` is resident (pinned or available).
    pub fn contains(&self, key: &I::Key) -> bool {
        self.find(key).is_some()
    }

    /// Slot currently holding `key`.
    pub fn slot_of(&self, key: &I::Key) -> Option<SlotId> {
        self.find(key)
    }

    /// Current refcount of `key`'s entry; `Some(0)` for available entries.
    pub fn refcount(&self, key: &I::Key) -> Option<u32> {
        self.find(key).map(|id| self.slab.entry(id).refcount())
    }

    pub fn pin_state(&self, key: &I::Key) -> Option<PinState> {
        self.find(key).map(|id| self.slab.entry(id).pin_state())
    }

    /// Looks at a resident item without pinning, reviving or reordering it.
    pub fn peek(&self, key: &I::Key) -> Option<&I> {
        #[cfg(feature = "metrics")]
        (&self.metrics).record_peek_call();

        let id = self.find(key)?;

        #[cfg(feature = "metrics")]
        (&self.metrics).record_peek_found();

        self.slab.entry(id).item()
    }

    /// Mutable access to an item the caller already holds a pin on.
    ///
    /// Returns `None` if `key` is absent or not pinned; does not change the
    /// refcount.
    pub fn leased_mut(&mut self, key: &I::Key) -> Option<&mut I> {
        let id = self.find(key)?;
        let entry = self.slab.entry_mut(id);
        if !entry.is_pinned() {
            return None;
        }
        entry.item_mut()
    }

    /// Inserts `item` pinned with a refcount of one.
    ///
    /// Takes the least recently released clean entry, else the least
    /// recently released dirty one; never-used slots are always taken first.
    /// A reclaimed slot's previous item is finalized with
    /// [`FinalizeCause::Evicted`].
    ///
    /// # Errors
    ///
    /// - [`InsertError::Duplicate`] if `item`'s key is already resident.
    /// - [`InsertError::CacheFull`] if every entry is pinned.
    ///
    /// In both cases nothing changes and the item is handed back.
    pub fn insert(&mut self, item: I) -> Result<Insertion<I::Key>, InsertError<I>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_insert_call();

        let key = item.key();
        if self.find(&key).is_some() {
            #[cfg(feature = "metrics")]
            self.metrics.record_insert_duplicate();
            debug!(key = ?key, "insert rejected: key already resident");
            return Err(InsertError::Duplicate(item));
        }

        let Some((id, victim_list)) = self.available.pop_victim() else {
            #[cfg(feature = "metrics")]
            self.metrics.record_insert_full();
            debug!(key = ?key, "insert rejected: every entry is pinned");
            return Err(InsertError::CacheFull(item));
        };

        if let Some(old_key) = self.slab.key(id) {
            let old_bucket = self.buckets.bucket_of(&old_key);
            self.buckets.remove(old_bucket, id);
        }

        let previous = self.slab.bind(id, item);
        let bucket = self.buckets.bucket_of(&key);
        self.buckets.insert(bucket, id);

        let evicted = match previous {
            Some(old) => {
                let old_key = old.key();
                debug!(
                    key = ?key,
                    evicted = ?old_key,
                    slot = id.index(),
                    list = %victim_list,
                    "evicting entry"
                );
                #[cfg(feature = "metrics")]
                {
                    self.metrics.record_insert_reused();
                    self.metrics.record_evicted_entry();
                    match victim_list {
                        Cleanliness::Clean => self.metrics.record_evicted_clean(),
                        Cleanliness::Dirty => self.metrics.record_evicted_dirty(),
                    }
                }
                self.finalize(old, FinalizeCause::Evicted);
                Some((old_key, victim_list))
            },
            None => {
                #[cfg(feature = "metrics")]
                self.metrics.record_insert_new();
                None
            },
        };

        Ok(Insertion { slot: id, evicted })
    }

    /// Pins `key`'s entry and returns its item.
    ///
    /// An available entry is taken off its availability list (revived) with
    /// its item untouched. The caller should [`release`](Self::release) once
    /// done; the item may be modified, including its dirty flag, in between.
    ///
    /// # Panics
    ///
    /// Panics if the entry's refcount would exceed `u32::MAX`.
    pub fn fetch(&mut self, key: &I::Key) -> Option<&mut I> {
        let Some(id) = self.find(key) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_get_miss();
            return None;
        };

        if let Some(PinTransition::Revived(list)) = self.slab.pin(id) {
            self.available.remove(list, id);
            debug!(key = ?key, slot = id.index(), list = %list, "revived entry");
            #[cfg(feature = "metrics")]
            self.metrics.record_revival();
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_get_hit();

        self.slab.entry_mut(id).item_mut()
    }

    /// Drops one pin on `key`'s entry.
    ///
    /// When the last pin goes, the entry becomes the most recently released
    /// member of the clean or dirty list, chosen by the item's dirty flag as
    /// it is now. It stays fetchable until reclaimed.
    ///
    /// # Errors
    ///
    /// [`RefcountUnderflow`] if the entry is resident but not pinned. Nothing
    /// changes in that case.
    pub fn release(&mut self, key: &I::Key) -> Result<Release, RefcountUnderflow<I::Key>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_release_call();

        let Some(id) = self.find(key) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_release_untracked();
            debug!(key = ?key, "release of key that is not resident");
            return Ok(Release::Untracked);
        };

        match self.slab.unpin(id) {
            Ok(UnpinTransition::StillPinned(refcount)) => Ok(Release::Pinned { refcount }),
            Ok(UnpinTransition::Released(list)) => {
                self.available.push(list, id);
                #[cfg(feature = "metrics")]
                match list {
                    Cleanliness::Clean => self.metrics.record_release_to_clean(),
                    Cleanliness::Dirty => self.metrics.record_release_to_dirty(),
                }
                Ok(Release::Available(list))
            },
            Err(NotPinned) => {
                #[cfg(feature = "metrics")]
                self.metrics.record_release_underflow();
                error!(key = ?key, slot = id.index(), "release of an entry with no pins");
                Err(RefcountUnderflow::new(*key))
            },
        }
    }

    /// Releases an item the caller owns.
    ///
    /// If the item's key is not resident the item is finalized with
    /// [`FinalizeCause::Untracked`]. If it is resident and pinned, the
    /// resident item is authoritative: the caller's copy is dropped and one
    /// pin is released as by [`release`](Self::release).
    ///
    /// If it is resident but has no pins the release is an underflow. The
    /// caller's item is still finalized with [`FinalizeCause::Untracked`]
    /// before the error is returned, so it never vanishes unseen.
    pub fn release_owned(&mut self, item: I) -> Result<Release, RefcountUnderflow<I::Key>> {
        let key = item.key();
        if let Some(id) = self.find(&key) {
            if self.slab.entry(id).is_pinned() {
                drop(item);
                return self.release(&key);
            }
            let underflow = self.release(&key);
            self.finalize(item, FinalizeCause::Untracked);
            return underflow;
        }

        #[cfg(feature = "metrics")]
        {
            self.metrics.record_release_call();
            self.metrics.record_release_untracked();
        }
        debug!(key = ?key, "finalizing released item that is not resident");
        self.finalize(item, FinalizeCause::Untracked);
        Ok(Release::Untracked)
    }

    /// Finalizes every resident item and resets the cache to its
    /// just-constructed state.
    ///
    /// Entries still pinned are finalized too, with a warning: their holders
    /// never released them.
    pub fn flush(&mut self) -> FlushReport {
        #[cfg(feature = "metrics")]
        self.metrics.record_clear();

        let mut report = FlushReport::default();
        for id in self.slab.ids() {
            let Some((item, refcount)) = self.slab.take(id) else {
                continue;
            };
            if refcount > 0 {
                warn!(
                    key = ?item.key(),
                    refcount,
                    "flushing entry that is still pinned"
                );
                report.leaked_pins += 1;
                #[cfg(feature = "metrics")]
                self.metrics.record_leaked_pin();
            }
            self.finalize(item, FinalizeCause::Flushed);
            report.finalized += 1;
        }

        self.buckets.clear();
        self.available.reset_all_clean();
        debug!(
            finalized = report.finalized,
            leaked_pins = report.leaked_pins,
            "cache flushed"
        );
        report
    }

    /// Verifies every structural invariant of the cache.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let capacity = self.capacity();
        let clean = self.available_clean_len();
        let dirty = self.available_dirty_len();
        let pinned = self.pinned_len();
        if pinned + clean + dirty != capacity {
            return Err(InvariantError::new(format!(
                "pinned {} + clean {} + dirty {} != capacity {}",
                pinned, clean, dirty, capacity
            )));
        }

        let mut membership: Vec<Option<Cleanliness>> = vec![None; capacity];
        for list in [Cleanliness::Clean, Cleanliness::Dirty] {
            for id in self.available.iter(list) {
                if membership[id.index()].replace(list).is_some() {
                    return Err(InvariantError::new(format!(
                        "slot {} is in more than one availability list",
                        id.index()
                    )));
                }
            }
        }

        let mut counted_pinned = 0usize;
        let mut counted_resident = 0usize;
        for (id, entry) in self.slab.iter() {
            let listed = membership[id.index()];
            let chained = self.buckets.is_chained(id);
            match entry.pin_state() {
                PinState::Empty => {
                    if chained || listed != Some(Cleanliness::Clean) {
                        return Err(InvariantError::new(format!(
                            "empty slot {} chained={} listed={:?}",
                            id.index(),
                            chained,
                            listed
                        )));
                    }
                },
                PinState::Pinned(_) => {
                    counted_pinned += 1;
                    if !chained || listed.is_some() {
                        return Err(InvariantError::new(format!(
                            "pinned slot {} chained={} listed={:?}",
                            id.index(),
                            chained,
                            listed
                        )));
                    }
                },
                PinState::Available(cleanliness) => {
                    if !chained || listed != Some(cleanliness) {
                        return Err(InvariantError::new(format!(
                            "available slot {} ({}) chained={} listed={:?}",
                            id.index(),
                            cleanliness,
                            chained,
                            listed
                        )));
                    }
                },
            }
            if entry.key().is_some() {
                counted_resident += 1;
            }
        }

        if counted_pinned != pinned || counted_resident != self.len() {
            return Err(InvariantError::new(format!(
                "gauges pinned={} resident={} but counted pinned={} resident={}",
                pinned,
                self.len(),
                counted_pinned,
                counted_resident
            )));
        }
        if self.buckets.len() != counted_resident {
            return Err(InvariantError::new(format!(
                "{} slots chained but {} resident",
                self.buckets.len(),
                counted_resident
            )));
        }

        // equal keys hash alike, so a duplicate would share a chain
        let mut chain_keys: Vec<I::Key> = Vec::new();
        for bucket in 0..self.buckets.bucket_count() {
            chain_keys.clear();
            for id in self.buckets.chain(bucket) {
                let Some(key) = self.slab.key(id) else {
                    return Err(InvariantError::new(format!(
                        "bucket {} chains empty slot {}",
                        bucket,
                        id.index()
                    )));
                };
                if self.buckets.bucket_of(&key) != bucket {
                    return Err(InvariantError::new(format!(
                        "key {:?} chained in bucket {} but hashes elsewhere",
                        key, bucket
                    )));
                }
                if chain_keys.contains(&key) {
                    return Err(InvariantError::new(format!(
                        "key {:?} is resident in more than one slot",
                        key
                    )));
                }
                chain_keys.push(key);
            }
        }

        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.buckets.debug_validate_invariants();
        self.available.debug_validate_invariants();
        if let Err(err) = self.check_invariants() {
            panic!("{}", err);
        }
    }

    #[cfg(any(test, debug_assertions))]
    /// Returns an availability list's slots, most recently released first.
    pub fn debug_snapshot_available(&self, list: Cleanliness) -> Vec<SlotId> {
        self.available.iter(list).collect()
    }

    fn find(&self, key: &I::Key) -> Option<SlotId> {
        let bucket = self.buckets.bucket_of(key);
        self.buckets
            .find(bucket, |id| self.slab.key(id).as_ref() == Some(key))
    }

    fn finalize(&mut self, item: I, cause: FinalizeCause) {
        #[cfg(feature = "metrics")]
        self.metrics.record_finalized();
        self.finalizer.finalize(item, cause);
    }
}

#[cfg(feature = "metrics")]
impl<I, F> RefcountCache<I, F>
where
    I: CacheItem,
    F: Finalizer<I>,
{
    pub fn metrics_snapshot(&self) -> RefcountMetricsSnapshot {
        RefcountMetricsSnapshot {
            get_calls: self.metrics.get_calls,
            get_hits: self.metrics.get_hits,
            get_misses: self.metrics.get_misses,
            revivals: self.metrics.revivals,
            insert_calls: self.metrics.insert_calls,
            insert_new: self.metrics.insert_new,
            insert_reused: self.metrics.insert_reused,
            insert_full: self.metrics.insert_full,
            insert_duplicate: self.metrics.insert_duplicate,
            evicted_entries: self.metrics.evicted_entries,
            evicted_clean: self.metrics.evicted_clean,
            evicted_dirty: self.metrics.evicted_dirty,
            release_calls: self.metrics.release_calls,
            release_to_clean: self.metrics.release_to_clean,
            release_to_dirty: self.metrics.release_to_dirty,
            release_untracked: self.metrics.release_untracked,
            release_underflows: self.metrics.release_underflows,
            finalized: self.metrics.finalized,
            flush_calls: self.metrics.flush_calls,
            leaked_pins: self.metrics.leaked_pins,
            peek_calls: self.metrics.peek_calls.get(),
            peek_found: self.metrics.peek_found.get(),
            capacity: self.capacity(),
            resident: self.len(),
            pinned: self.pinned_len(),
            available_clean: self.available_clean_len(),
            available_dirty: self.available_dirty_len(),
        }
    }
}

#[cfg(feature = "metrics")]
impl<I, F> MetricsSnapshotProvider<RefcountMetricsSnapshot> for RefcountCache<I, F>
where
    I: CacheItem,
    F: Finalizer<I>,
{
    fn snapshot(&self) -> RefcountMetricsSnapshot {
        self.metrics_snapshot()
    }
}

impl<I, F> fmt::Debug for RefcountCache<I, F>
where
    I: CacheItem,
    F: Finalizer<I>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefcountCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("pinned", &self.pinned_len())
            .field("available_clean", &self.available_clean_len())
            .field("available_dirty", &self.available_dirty_len())
            .field("bucket_hash", &self.bucket_hash())
            .finish_non_exhaustive()
    }
}

impl<I, F> Drop for RefcountCache<I, F>
where
    I: CacheItem,
    F: Finalizer<I>,
{
    fn drop(&mut self) {
        if !self.is_empty() {
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::item::Item;
    use crate::traits::DropFinalizer;

    type FinalizeLog = Rc<RefCell<Vec<(u64, FinalizeCause, bool)>>>;

    fn finalize_log() -> FinalizeLog {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn recording_cache(
        capacity: usize,
    ) -> RefcountCache<Item<u64, u64>, impl FnMut(Item<u64, u64>, FinalizeCause)> {
        recording_cache_into(capacity, finalize_log())
    }

    fn recording_cache_into(
        capacity: usize,
        log: FinalizeLog,
    ) -> RefcountCache<Item<u64, u64>, impl FnMut(Item<u64, u64>, FinalizeCause)> {
        RefcountCache::new(capacity, move |item: Item<u64, u64>, cause: FinalizeCause| {
            log.borrow_mut().push((item.key(), cause, item.is_dirty()));
        })
    }

    fn item(key: u64) -> Item<u64, u64> {
        Item::new(key, key * 100)
    }

    #[test]
    fn new_cache_is_all_available_clean() {
        let cache: RefcountCache<Item<u64, u64>, _> = RefcountCache::new(4, DropFinalizer);
        assert_eq!(cache.capacity(), 4);
        assert!(cache.is_empty());
        assert_eq!(cache.available_clean_len(), 4);
        assert_eq!(cache.available_dirty_len(), 0);
        assert_eq!(cache.pinned_len(), 0);
        cache.debug_validate_invariants();
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = RefcountCache::<Item<u64, u64>, _>::try_new(0, DropFinalizer);
        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn zero_capacity_new_panics() {
        let _ = RefcountCache::<Item<u64, u64>, _>::new(0, DropFinalizer);
    }

    #[test]
    fn insert_pins_with_refcount_one() {
        let mut cache = recording_cache(3);
        let inserted = cache.insert(item(1)).unwrap();
        assert_eq!(inserted.evicted, None);
        assert_eq!(cache.refcount(&1), Some(1));
        assert_eq!(cache.pin_state(&1), Some(PinState::Pinned(1)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.pinned_len(), 1);
        cache.debug_validate_invariants();
    }

    #[test]
    fn never_used_slots_are_taken_in_index_order() {
        let mut cache = recording_cache(3);
        let slots: Vec<_> = (1..=3)
            .map(|k| cache.insert(item(k)).unwrap().slot.index())
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn empty_slots_are_used_before_released_entries_are_evicted() {
        let mut cache = recording_cache(3);
        cache.insert(item(1)).unwrap();
        cache.release(&1).unwrap();
        let inserted = cache.insert(item(2)).unwrap();
        assert_eq!(inserted.evicted, None);
        assert!(cache.contains(&1));
        cache.debug_validate_invariants();
    }

    #[test]
    fn insert_duplicate_is_rejected_without_change() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        let err = cache.insert(Item::new(1, 999)).unwrap_err();
        assert!(matches!(err, InsertError::Duplicate(_)));
        assert_eq!(err.into_item().into_value(), 999);
        assert_eq!(cache.peek(&1).map(|i| *i.value()), Some(100));
        assert_eq!(cache.refcount(&1), Some(1));

        // also rejected while the resident entry is only available
        cache.release(&1).unwrap();
        assert!(cache.insert(Item::new(1, 5)).unwrap_err().item().value() == &5);
        cache.debug_validate_invariants();
    }

    #[test]
    fn insert_into_fully_pinned_cache_fails() {
        let mut cache = recording_cache(3);
        for k in 1..=3 {
            cache.insert(item(k)).unwrap();
        }
        let err = cache.insert(item(4)).unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_item().key(), 4);
        for k in 1..=3 {
            assert!(cache.fetch(&k).is_some());
        }
        cache.debug_validate_invariants();
    }

    #[test]
    fn fetch_miss_changes_nothing() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        assert!(cache.fetch(&2).is_none());
        assert_eq!(cache.refcount(&1), Some(1));
    }

    #[test]
    fn revival_keeps_the_same_item() {
        let mut cache = recording_cache(2);
        cache.insert(item(7)).unwrap();
        assert_eq!(cache.release(&7).unwrap(), Release::Available(Cleanliness::Clean));
        assert_eq!(cache.refcount(&7), Some(0));

        let fetched = cache.fetch(&7).unwrap();
        assert_eq!(*fetched.value(), 700);
        assert_eq!(cache.refcount(&7), Some(1));
        assert!(cache.debug_snapshot_available(Cleanliness::Clean).len() == 1);
        cache.debug_validate_invariants();
    }

    #[test]
    fn release_order_decides_eviction_order() {
        let log = finalize_log();
        let mut cache = recording_cache_into(3, Rc::clone(&log));
        for k in 1..=3 {
            cache.insert(item(k)).unwrap();
        }
        let slot_of_1 = cache.slot_of(&1).unwrap();
        for k in 1..=3 {
            cache.release(&k).unwrap();
        }

        let inserted = cache.insert(item(4)).unwrap();
        assert_eq!(inserted.slot, slot_of_1);
        assert_eq!(inserted.evicted, Some((1, Cleanliness::Clean)));
        assert!(cache.fetch(&1).is_none());
        assert!(cache.fetch(&2).is_some());
        assert!(cache.fetch(&3).is_some());
        assert_eq!(
            log.borrow().as_slice(),
            &[(1, FinalizeCause::Evicted, false)]
        );
        cache.debug_validate_invariants();
    }

    #[test]
    fn clean_entries_are_evicted_before_dirty_ones() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        cache.release(&1).unwrap();
        cache.insert(Item::dirty(2, 0)).unwrap();
        cache.release(&2).unwrap();

        let inserted = cache.insert(item(3)).unwrap();
        assert_eq!(inserted.evicted, Some((1, Cleanliness::Clean)));
        assert!(cache.contains(&2));
        cache.release(&3).unwrap();

        // 3 is clean, so it goes before the older dirty 2
        let inserted = cache.insert(item(4)).unwrap();
        assert_eq!(inserted.evicted, Some((3, Cleanliness::Clean)));

        // only the dirty entry is left to evict
        let inserted = cache.insert(item(5)).unwrap();
        assert_eq!(inserted.evicted, Some((2, Cleanliness::Dirty)));
        cache.debug_validate_invariants();
    }

    #[test]
    fn dirty_flag_is_read_at_release_time() {
        let mut cache = recording_cache(1);
        cache.insert(item(1)).unwrap();
        cache.leased_mut(&1).unwrap().mark_dirty();
        assert_eq!(cache.release(&1).unwrap(), Release::Available(Cleanliness::Dirty));
        assert_eq!(cache.available_dirty_len(), 1);
        assert_eq!(cache.available_clean_len(), 0);

        // revive, clean it up, release again: now clean
        cache.fetch(&1).unwrap().mark_clean();
        assert_eq!(cache.release(&1).unwrap(), Release::Available(Cleanliness::Clean));
        cache.debug_validate_invariants();
    }

    #[test]
    fn dirty_only_candidates_are_still_evictable() {
        let log = finalize_log();
        let mut cache = recording_cache_into(1, Rc::clone(&log));
        cache.insert(Item::dirty(1, 0)).unwrap();
        cache.release(&1).unwrap();
        let inserted = cache.insert(item(2)).unwrap();
        assert_eq!(inserted.evicted, Some((1, Cleanliness::Dirty)));
        assert_eq!(log.borrow()[0], (1, FinalizeCause::Evicted, true));
    }

    #[test]
    fn pinned_entries_are_never_evicted() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        cache.insert(item(2)).unwrap();
        cache.release(&2).unwrap();

        // 1 is the oldest entry but pinned
        let inserted = cache.insert(item(3)).unwrap();
        assert_eq!(inserted.evicted, Some((2, Cleanliness::Clean)));
        assert_eq!(cache.refcount(&1), Some(1));
        assert!(cache.insert(item(4)).unwrap_err().is_full());
    }

    #[test]
    fn nested_pins_need_matching_releases() {
        let mut cache = recording_cache(1);
        cache.insert(item(1)).unwrap();
        cache.fetch(&1).unwrap();
        cache.fetch(&1).unwrap();
        assert_eq!(cache.refcount(&1), Some(3));
        assert_eq!(cache.release(&1).unwrap(), Release::Pinned { refcount: 2 });
        assert_eq!(cache.release(&1).unwrap(), Release::Pinned { refcount: 1 });
        assert!(cache.insert(item(2)).unwrap_err().is_full());
        assert_eq!(cache.release(&1).unwrap(), Release::Available(Cleanliness::Clean));
        assert!(cache.insert(item(2)).is_ok());
    }

    #[test]
    fn double_release_is_an_error_and_changes_nothing() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        cache.release(&1).unwrap();
        let before = cache.debug_snapshot_available(Cleanliness::Clean);

        let err = cache.release(&1).unwrap_err();
        assert_eq!(*err.key(), 1);
        assert_eq!(cache.debug_snapshot_available(Cleanliness::Clean), before);
        assert_eq!(cache.refcount(&1), Some(0));
        cache.debug_validate_invariants();
    }

    #[test]
    fn release_of_absent_key_is_untracked() {
        let mut cache = recording_cache(1);
        assert_eq!(cache.release(&9).unwrap(), Release::Untracked);
        cache.debug_validate_invariants();
    }

    #[test]
    fn release_owned_finalizes_untracked_items() {
        let log = finalize_log();
        let mut cache = recording_cache_into(1, Rc::clone(&log));
        cache.insert(item(1)).unwrap();

        let rejected = cache.insert(Item::dirty(2, 0)).unwrap_err().into_item();
        assert_eq!(cache.release_owned(rejected).unwrap(), Release::Untracked);
        assert_eq!(log.borrow().as_slice(), &[(2, FinalizeCause::Untracked, true)]);

        // resident key: releases a pin, caller's copy is dropped unfinalized
        assert_eq!(
            cache.release_owned(item(1)).unwrap(),
            Release::Available(Cleanliness::Clean)
        );
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn release_owned_underflow_still_finalizes_the_item() {
        let log = finalize_log();
        let mut cache = recording_cache_into(2, Rc::clone(&log));
        cache.insert(item(1)).unwrap();
        cache.release(&1).unwrap();

        let err = cache.release_owned(Item::dirty(1, 99)).unwrap_err();
        assert_eq!(*err.key(), 1);
        assert_eq!(log.borrow().as_slice(), &[(1, FinalizeCause::Untracked, true)]);

        // resident entry untouched
        assert_eq!(cache.refcount(&1), Some(0));
        assert_eq!(cache.peek(&1).map(|i| *i.value()), Some(100));
        assert_eq!(cache.debug_snapshot_available(Cleanliness::Clean).len(), 2);
        cache.debug_validate_invariants();
    }

    #[test]
    fn flush_finalizes_everything_and_resets() {
        let log = finalize_log();
        let mut cache = recording_cache_into(4, Rc::clone(&log));
        cache.insert(item(1)).unwrap();
        cache.insert(Item::dirty(2, 0)).unwrap();
        cache.insert(item(3)).unwrap();
        cache.release(&2).unwrap();
        cache.release(&3).unwrap();

        let report = cache.flush();
        assert_eq!(
            report,
            FlushReport {
                finalized: 3,
                leaked_pins: 1
            }
        );
        assert!(cache.is_empty());
        assert_eq!(cache.available_clean_len(), 4);
        assert_eq!(cache.available_dirty_len(), 0);
        assert!(!cache.contains(&1));
        cache.debug_validate_invariants();

        let mut seen: Vec<_> = log.borrow().iter().map(|(k, c, _)| (*k, *c)).collect();
        seen.sort_by_key(|(k, _)| *k);
        assert_eq!(
            seen,
            vec![
                (1, FinalizeCause::Flushed),
                (2, FinalizeCause::Flushed),
                (3, FinalizeCause::Flushed)
            ]
        );

        // behaves like new afterwards
        let slots: Vec<_> = (10..14)
            .map(|k| cache.insert(item(k)).unwrap().slot.index())
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
    }

    #[test]
    fn flush_walks_slots_in_index_order() {
        let log = finalize_log();
        let mut cache = recording_cache_into(4, Rc::clone(&log));
        for key in [5, 3, 9] {
            cache.insert(item(key)).unwrap();
            cache.release(&key).unwrap();
        }
        // revive 3 so its slot is pinned at flush time
        cache.fetch(&3);

        let report = cache.flush();
        assert_eq!(report.finalized, 3);
        assert_eq!(report.leaked_pins, 1);
        let keys: Vec<_> = log.borrow().iter().map(|(k, _, _)| *k).collect();
        assert_eq!(keys, vec![5, 3, 9]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn flush_of_empty_cache_is_a_no_op() {
        let mut cache = recording_cache(2);
        assert_eq!(cache.flush(), FlushReport::default());
    }

    #[test]
    fn drop_flushes_resident_items() {
        let log = finalize_log();
        {
            let mut cache = recording_cache_into(2, Rc::clone(&log));
            cache.insert(item(1)).unwrap();
            cache.release(&1).unwrap();
        }
        assert_eq!(log.borrow().as_slice(), &[(1, FinalizeCause::Flushed, false)]);
    }

    #[test]
    fn peek_and_leased_mut_do_not_pin() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        cache.release(&1).unwrap();

        assert_eq!(cache.peek(&1).map(|i| *i.value()), Some(100));
        assert_eq!(cache.refcount(&1), Some(0));
        assert!(cache.leased_mut(&1).is_none());
        assert!(cache.peek(&2).is_none());

        cache.fetch(&1).unwrap();
        *cache.leased_mut(&1).unwrap().value_mut() = 5;
        assert_eq!(cache.refcount(&1), Some(1));
        assert_eq!(cache.peek(&1).map(|i| *i.value()), Some(5));
    }

    #[test]
    fn colliding_keys_share_a_chain() {
        let mut cache = recording_cache(4);
        // 1, 5, 9 all land in bucket 1 under modulo hashing
        for k in [1, 5, 9] {
            cache.insert(item(k)).unwrap();
        }
        cache.release(&5).unwrap();
        assert!(cache.fetch(&9).is_some());
        assert!(cache.fetch(&5).is_some());
        assert!(!cache.contains(&13));
        cache.debug_validate_invariants();
    }

    #[test]
    fn murmur3_hashing_behaves_the_same() {
        let mut cache: RefcountCache<Item<u64, u64>, _> =
            RefcountCache::try_with_hash(3, BucketHash::Murmur3, DropFinalizer).unwrap();
        assert_eq!(cache.bucket_hash(), BucketHash::Murmur3);
        for k in [0, 1 << 32, 2 << 32] {
            cache.insert(item(k)).unwrap();
            cache.release(&k).unwrap();
        }
        assert!(cache.fetch(&(1 << 32)).is_some());
        let inserted = cache.insert(item(3)).unwrap();
        assert_eq!(inserted.evicted, Some((0, Cleanliness::Clean)));
        cache.debug_validate_invariants();
    }

    #[test]
    fn debug_output_summarises_state() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        let text = format!("{:?}", cache);
        assert!(text.contains("capacity: 2"));
        assert!(text.contains("pinned: 1"));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_track_operations() {
        let mut cache = recording_cache(2);
        cache.insert(item(1)).unwrap();
        cache.insert(Item::dirty(2, 0)).unwrap();
        assert!(cache.insert(item(3)).unwrap_err().is_full());
        assert!(cache.insert(item(1)).is_err());
        cache.release(&1).unwrap();
        cache.release(&2).unwrap();
        cache.fetch(&1).unwrap();
        cache.fetch(&8);
        cache.release(&1).unwrap();
        let _ = cache.release(&1);
        cache.insert(item(3)).unwrap();
        cache.peek(&3);

        let snapshot = cache.metrics_snapshot();
        assert_eq!(snapshot.insert_calls, 5);
        assert_eq!(snapshot.insert_new, 2);
        assert_eq!(snapshot.insert_reused, 1);
        assert_eq!(snapshot.insert_full, 1);
        assert_eq!(snapshot.insert_duplicate, 1);
        assert_eq!(snapshot.evicted_clean, 1);
        assert_eq!(snapshot.evicted_dirty, 0);
        assert_eq!(snapshot.revivals, 1);
        assert_eq!(snapshot.get_hits, 1);
        assert_eq!(snapshot.get_misses, 1);
        assert_eq!(snapshot.release_to_clean, 2);
        assert_eq!(snapshot.release_to_dirty, 1);
        assert_eq!(snapshot.release_underflows, 1);
        assert_eq!(snapshot.finalized, 1);
        assert_eq!(snapshot.peek_calls, 1);
        assert_eq!(snapshot.peek_found, 1);
        assert_eq!(snapshot.pinned, 1);
        assert_eq!(snapshot.available_dirty, 1);
        assert_eq!(snapshot, MetricsSnapshotProvider::snapshot(&cache));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Insert(u64, bool),
            Fetch(u64),
            Release(u64),
            Dirty(u64),
            Flush,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (0u64..24, any::<bool>()).prop_map(|(k, d)| Op::Insert(k, d)),
                3 => (0u64..24).prop_map(Op::Fetch),
                4 => (0u64..24).prop_map(Op::Release),
                1 => (0u64..24).prop_map(Op::Dirty),
                1 => Just(Op::Flush),
            ]
        }

        proptest! {
            /// Invariants hold after any operation sequence, and every item
            /// inserted is finalized exactly once by the time the cache drops.
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_arbitrary_ops_maintain_invariants(
                capacity in 1usize..12,
                ops in prop::collection::vec(op_strategy(), 0..300)
            ) {
                let log = finalize_log();
                let mut inserted = 0usize;
                {
                    let mut cache = recording_cache_into(capacity, Rc::clone(&log));
                    for op in ops {
                        match op {
                            Op::Insert(k, dirty) => {
                                let mut it = item(k);
                                it.set_dirty(dirty);
                                if cache.insert(it).is_ok() {
                                    inserted += 1;
                                }
                            },
                            Op::Fetch(k) => { cache.fetch(&k); },
                            Op::Release(k) => { let _ = cache.release(&k); },
                            Op::Dirty(k) => {
                                if let Some(it) = cache.leased_mut(&k) {
                                    it.mark_dirty();
                                }
                            },
                            Op::Flush => { cache.flush(); },
                        }
                        prop_assert!(cache.check_invariants().is_ok());
                        prop_assert_eq!(
                            cache.pinned_len() + cache.available_clean_len() + cache.available_dirty_len(),
                            capacity
                        );
                    }
                }
                prop_assert_eq!(log.borrow().len(), inserted);
            }

            /// A pinned entry is never the one evicted.
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_pinned_entries_survive_inserts(
                capacity in 2usize..10,
                keys in prop::collection::vec(100u64..1000, 0..100)
            ) {
                let mut cache = recording_cache(capacity);
                cache.insert(item(0)).unwrap();
                for k in keys {
                    if let Ok(inserted) = cache.insert(item(k)) {
                        prop_assert_ne!(inserted.evicted.map(|(key, _)| key), Some(0));
                        cache.release(&k).unwrap();
                    }
                    prop_assert_eq!(cache.refcount(&0), Some(1));
                }
            }
        }
    }
}
