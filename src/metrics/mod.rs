//! Per-instance cache metrics (feature `metrics`).
//!
//! Every [`RefcountCache`](crate::policy::refcount::RefcountCache) owns its own
//! [`RefcountMetrics`](metrics_impl::RefcountMetrics) accumulator; there are no
//! process-wide counters.

pub mod cell;
pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;
