pub mod refcount;

pub use refcount::{FlushReport, Insertion, RefcountCache, Release};
