//! Error types for the refcache library.
//!
//! ## Key Components
//!
//! - [`InsertError`]: An insert was rejected; carries the item back to the
//!   caller, who keeps ownership.
//! - [`RefcountUnderflow`]: A release on an entry that was not pinned
//!   (double release). No state is changed.
//! - [`InvariantError`]: Returned by
//!   [`RefcountCache::check_invariants`](crate::policy::refcount::RefcountCache::check_invariants).
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid.
//!
//! ## Example Usage
//!
//! ```
//! use refcache::error::InsertError;
//! use refcache::item::Item;
//! use refcache::policy::refcount::RefcountCache;
//! use refcache::traits::DropFinalizer;
//!
//! let mut cache = RefcountCache::new(1, DropFinalizer);
//! cache.insert(Item::new(1u64, "a")).unwrap();
//!
//! // Every slot is pinned, so the item comes back to us.
//! let err = cache.insert(Item::new(2u64, "b")).unwrap_err();
//! assert!(matches!(err, InsertError::CacheFull(_)));
//! assert_eq!(err.into_item().into_value(), "b");
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InsertError
// ---------------------------------------------------------------------------

/// Error returned when an insert is rejected.
///
/// The cache is left untouched and the item is handed back.
#[derive(Clone, PartialEq, Eq)]
pub enum InsertError<I> {
    /// Every slot is pinned; nothing can be evicted.
    CacheFull(I),
    /// An entry for the item's key is already resident (pinned or available).
    Duplicate(I),
}

impl<I> InsertError<I> {
    /// Returns the rejected item.
    #[inline]
    pub fn into_item(self) -> I {
        match self {
            InsertError::CacheFull(item) | InsertError::Duplicate(item) => item,
        }
    }

    /// Borrows the rejected item.
    #[inline]
    pub fn item(&self) -> &I {
        match self {
            InsertError::CacheFull(item) | InsertError::Duplicate(item) => item,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, InsertError::CacheFull(_))
    }
}

impl<I> fmt::Debug for InsertError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::CacheFull(_) => f.write_str("CacheFull(..)"),
            InsertError::Duplicate(_) => f.write_str("Duplicate(..)"),
        }
    }
}

impl<I> fmt::Display for InsertError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::CacheFull(_) => f.write_str("cache full: every entry is pinned"),
            InsertError::Duplicate(_) => f.write_str("key is already resident in the cache"),
        }
    }
}

impl<I> std::error::Error for InsertError<I> {}

// ---------------------------------------------------------------------------
// RefcountUnderflow
// ---------------------------------------------------------------------------

/// Error returned when a release targets an entry whose pin count is already
/// zero.
///
/// This is a caller contract violation (double release). The cache rejects
/// the release instead of corrupting its availability lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefcountUnderflow<K> {
    key: K,
}

impl<K> RefcountUnderflow<K> {
    #[inline]
    pub fn new(key: K) -> Self {
        Self { key }
    }

    /// The key that was over-released.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: fmt::Debug> fmt::Display for RefcountUnderflow<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "release of unpinned entry {:?}", self.key)
    }
}

impl<K: fmt::Debug> std::error::Error for RefcountUnderflow<K> {}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// # Example
///
/// ```
/// use refcache::builder::CacheBuilder;
/// use refcache::item::Item;
/// use refcache::traits::DropFinalizer;
///
/// let err = CacheBuilder::new(0)
///     .try_build::<Item<u64, ()>, _>(DropFinalizer)
///     .unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
