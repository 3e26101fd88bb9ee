//! refcache: a fixed-capacity object cache with refcounted pinning and
//! clean-before-dirty LRU eviction.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod ds;
pub mod error;
pub mod item;
pub mod policy;
pub mod store;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
pub mod traits;
