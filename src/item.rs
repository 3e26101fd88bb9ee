//! Ready-made [`CacheItem`]: a key, an opaque value and a dirty flag.

use std::fmt::Debug;

use crate::traits::{BucketKey, CacheItem};

/// A keyed value with a dirty flag.
///
/// # Example
///
/// ```
/// use refcache::item::Item;
/// use refcache::traits::CacheItem;
///
/// let mut item = Item::new(7u64, "seven");
/// assert!(!item.is_dirty());
/// *item.value_mut() = "SEVEN";
/// item.mark_dirty();
/// assert!(item.is_dirty());
/// assert_eq!(item.into_value(), "SEVEN");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<K, V> {
    key: K,
    value: V,
    dirty: bool,
}

impl<K, V> Item<K, V> {
    /// Creates a clean item.
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            dirty: false,
        }
    }

    /// Creates an item that already carries unflushed changes.
    pub fn dirty(key: K, value: V) -> Self {
        Self {
            key,
            value,
            dirty: true,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Mutable access to the value. Does not touch the dirty flag.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn into_parts(self) -> (K, V, bool) {
        (self.key, self.value, self.dirty)
    }
}

impl<K, V> CacheItem for Item<K, V>
where
    K: BucketKey + Eq + Copy + Debug,
{
    type Key = K;

    #[inline]
    fn key(&self) -> K {
        self.key
    }

    #[inline]
    fn is_dirty(&self) -> bool {
        self.dirty
    }
}
