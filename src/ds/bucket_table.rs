//! Bucket table: hash-chain heads over their own [`LinkTable`].
//!
//! One circular chain per bucket; the table has exactly as many buckets as
//! the cache has slots. A key is reduced to a bucket index by
//! [`BucketHash`], and lookup is a linear scan of that chain. The table stores
//! no keys itself; callers supply a predicate that compares a slot's key.
//!
//! ```text
//!   heads[0] ─► [4] ◄──► [0] ◄┐      (keys 4 and 0 with capacity 4, Modulo)
//!                ▲            │
//!                └────────────┘
//!   heads[1] ─► (empty)
//!   heads[2] ─► [2] ◄┐
//!                ▲   │
//!                └───┘
//! ```

use crate::ds::intrusive_list::{CircularList, CircularListIter, LinkTable};
use crate::ds::slot_arena::SlotId;
use crate::traits::BucketKey;

/// How a key's seed is reduced to a bucket index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketHash {
    /// `seed % buckets`. Spreads sequential ids evenly without hashing.
    #[default]
    Modulo,
    /// 64-bit MurmurHash3 finalizer, then `% buckets`.
    Murmur3,
}

impl BucketHash {
    #[inline]
    pub fn reduce(self, seed: u64, buckets: usize) -> usize {
        let mixed = match self {
            BucketHash::Modulo => seed,
            BucketHash::Murmur3 => fmix64(seed),
        };
        (mixed % buckets as u64) as usize
    }
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[derive(Debug)]
pub struct BucketTable {
    heads: Box<[CircularList]>,
    links: LinkTable,
    hash: BucketHash,
}

impl BucketTable {
    /// Creates `capacity` empty buckets over `capacity` slots.
    pub fn new(capacity: usize, hash: BucketHash) -> Self {
        Self {
            heads: vec![CircularList::new(); capacity].into_boxed_slice(),
            links: LinkTable::new(capacity),
            hash,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    pub fn hash(&self) -> BucketHash {
        self.hash
    }

    #[inline]
    pub fn bucket_of<K: BucketKey + ?Sized>(&self, key: &K) -> usize {
        self.hash.reduce(key.bucket_seed(), self.heads.len())
    }

    /// Returns `true` if `id` is in any chain.
    pub fn is_chained(&self, id: SlotId) -> bool {
        self.links.is_linked(id)
    }

    /// Prepends `id` to `bucket`'s chain.
    pub fn insert(&mut self, bucket: usize, id: SlotId) {
        self.heads[bucket].push_front(&mut self.links, id);
    }

    /// Unlinks `id` from `bucket`'s chain.
    pub fn remove(&mut self, bucket: usize, id: SlotId) {
        self.heads[bucket].remove(&mut self.links, id);
    }

    /// Linear scan of `bucket` for the first slot matching `is_match`.
    pub fn find(&self, bucket: usize, mut is_match: impl FnMut(SlotId) -> bool) -> Option<SlotId> {
        self.chain(bucket).find(|&id| is_match(id))
    }

    /// Iterates `bucket`'s chain from head to tail.
    pub fn chain(&self, bucket: usize) -> CircularListIter<'_> {
        self.heads[bucket].iter(&self.links)
    }

    /// Total number of chained slots.
    pub fn len(&self) -> usize {
        self.heads.iter().map(CircularList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.iter().all(CircularList::is_empty)
    }

    /// Empties every chain.
    pub fn clear(&mut self) {
        self.heads
            .iter_mut()
            .for_each(|head| *head = CircularList::new());
        self.links.clear();
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        for head in self.heads.iter() {
            head.debug_validate_invariants(&self.links);
        }
    }
}
