//! # Cache Trait Seams
//!
//! The engine is generic over three small traits:
//!
//! ```text
//!   ┌──────────────────────────┐   ┌──────────────────────────┐
//!   │      CacheItem           │   │      BucketKey           │
//!   │                          │   │                          │
//!   │  type Key: BucketKey     │──►│  bucket_seed() → u64     │
//!   │  key() → Key             │   │                          │
//!   │  is_dirty() → bool       │   │  (positional mapping,    │
//!   └──────────────────────────┘   │   no general hashing)    │
//!                                  └──────────────────────────┘
//!   ┌──────────────────────────────────────────────────────────┐
//!   │      Finalizer<I>                                        │
//!   │                                                          │
//!   │  finalize(&mut, I, FinalizeCause)                        │
//!   │                                                          │
//!   │  Called exactly once per item leaving cache custody:     │
//!   │  eviction, untracked release, or flush.                  │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! | Trait        | Implemented by                          |
//! |--------------|-----------------------------------------|
//! | `CacheItem`  | [`Item`](crate::item::Item), user types |
//! | `BucketKey`  | all primitive integers                  |
//! | `Finalizer`  | `FnMut(I, FinalizeCause)`, `DropFinalizer` |
//!
//! The finalizer is the only seam to write-back. It runs synchronously while the
//! cache holds `&mut self`, so it cannot re-enter the cache.

use std::fmt::{self, Debug};

/// Maps a key onto the integer the bucket table reduces into a bucket index.
///
/// Signed integers use their two's-complement bits, so `-1i32` maps to
/// `u32::MAX as u64`.
pub trait BucketKey {
    fn bucket_seed(&self) -> u64;
}

macro_rules! impl_bucket_key_unsigned {
    ($($t:ty),*) => {
        $(impl BucketKey for $t {
            #[inline]
            fn bucket_seed(&self) -> u64 {
                *self as u64
            }
        })*
    };
}

macro_rules! impl_bucket_key_signed {
    ($($t:ty => $u:ty),*) => {
        $(impl BucketKey for $t {
            #[inline]
            fn bucket_seed(&self) -> u64 {
                *self as $u as u64
            }
        })*
    };
}

impl_bucket_key_unsigned!(u8, u16, u32, u64, usize);
impl_bucket_key_signed!(i8 => u8, i16 => u16, i32 => u32, i64 => u64, isize => usize);

/// A value the cache can hold.
///
/// The key must not change while the item is resident. The dirty flag may
/// change at any time while the caller holds a pin; it is read when the pin
/// count drops to zero.
pub trait CacheItem {
    type Key: BucketKey + Eq + Copy + Debug;

    fn key(&self) -> Self::Key;

    /// `true` if the item has modifications its backing store has not seen.
    fn is_dirty(&self) -> bool;

    fn cleanliness(&self) -> Cleanliness {
        Cleanliness::from_dirty(self.is_dirty())
    }
}

/// Which availability list an unpinned entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cleanliness {
    Clean,
    Dirty,
}

impl Cleanliness {
    #[inline]
    pub fn from_dirty(dirty: bool) -> Self {
        if dirty {
            Cleanliness::Dirty
        } else {
            Cleanliness::Clean
        }
    }

    #[inline]
    pub fn is_dirty(self) -> bool {
        self == Cleanliness::Dirty
    }
}

impl fmt::Display for Cleanliness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cleanliness::Clean => f.write_str("clean"),
            Cleanliness::Dirty => f.write_str("dirty"),
        }
    }
}

/// Why an item left cache custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinalizeCause {
    /// The item's slot was reclaimed for a different key.
    Evicted,
    /// The caller released an item whose key was not resident.
    Untracked,
    /// The cache was flushed (or dropped).
    Flushed,
}

impl fmt::Display for FinalizeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeCause::Evicted => f.write_str("evicted to make room"),
            FinalizeCause::Untracked => f.write_str("released while not resident"),
            FinalizeCause::Flushed => f.write_str("flushed"),
        }
    }
}

/// Terminal action for items permanently leaving the cache.
///
/// Implementations are responsible for any write-back implied by
/// [`CacheItem::is_dirty`].
pub trait Finalizer<I> {
    fn finalize(&mut self, item: I, cause: FinalizeCause);
}

impl<I, F> Finalizer<I> for F
where
    F: FnMut(I, FinalizeCause),
{
    #[inline]
    fn finalize(&mut self, item: I, cause: FinalizeCause) {
        self(item, cause)
    }
}

/// Finalizer that simply drops items.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropFinalizer;

impl<I> Finalizer<I> for DropFinalizer {
    #[inline]
    fn finalize(&mut self, item: I, _cause: FinalizeCause) {
        drop(item);
    }
}
