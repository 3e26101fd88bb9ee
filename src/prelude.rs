pub use crate::builder::CacheBuilder;
pub use crate::ds::{BucketHash, SlotId};
pub use crate::error::{ConfigError, InsertError, InvariantError, RefcountUnderflow};
pub use crate::item::Item;
#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::RefcountMetricsSnapshot;
pub use crate::policy::refcount::{FlushReport, Insertion, RefcountCache, Release};
pub use crate::store::slab::PinState;
pub use crate::traits::{
    BucketKey, CacheItem, Cleanliness, DropFinalizer, FinalizeCause, Finalizer,
};
