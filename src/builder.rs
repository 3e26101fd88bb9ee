//! Validated construction of [`RefcountCache`] instances.
//!
//! Capacity usually comes from configuration, so the builder offers a
//! fallible [`try_build`](CacheBuilder::try_build) next to the panicking
//! [`build`](CacheBuilder::build) meant for literal values.
//!
//! ## Example
//!
//! ```rust
//! use refcache::builder::CacheBuilder;
//! use refcache::ds::bucket_table::BucketHash;
//! use refcache::item::Item;
//! use refcache::traits::DropFinalizer;
//!
//! let mut cache = CacheBuilder::new(100)
//!     .bucket_hash(BucketHash::Murmur3)
//!     .build::<Item<u64, String>, _>(DropFinalizer);
//!
//! cache.insert(Item::new(1, "hello".to_string())).unwrap();
//! assert_eq!(cache.fetch(&1).map(|item| item.value().as_str()), Some("hello"));
//! ```

use crate::ds::bucket_table::BucketHash;
use crate::error::ConfigError;
use crate::policy::refcount::RefcountCache;
use crate::traits::{CacheItem, Finalizer};

/// Builder for creating cache instances.
#[derive(Debug, Clone, Copy)]
pub struct CacheBuilder {
    capacity: usize,
    hash: BucketHash,
}

impl CacheBuilder {
    /// Create a new cache builder with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hash: BucketHash::default(),
        }
    }

    /// Override the number of slots.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Choose how keys map to buckets. Defaults to [`BucketHash::Modulo`].
    pub fn bucket_hash(mut self, hash: BucketHash) -> Self {
        self.hash = hash;
        self
    }

    /// Build a cache, rejecting an invalid configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the capacity is zero.
    pub fn try_build<I, F>(self, finalizer: F) -> Result<RefcountCache<I, F>, ConfigError>
    where
        I: CacheItem,
        F: Finalizer<I>,
    {
        RefcountCache::try_with_hash(self.capacity, self.hash, finalizer)
    }

    /// Build a cache.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is zero.
    pub fn build<I, F>(self, finalizer: F) -> RefcountCache<I, F>
    where
        I: CacheItem,
        F: Finalizer<I>,
    {
        match self.try_build(finalizer) {
            Ok(cache) => cache,
            Err(err) => panic!("invalid cache configuration: {}", err),
        }
    }
}
