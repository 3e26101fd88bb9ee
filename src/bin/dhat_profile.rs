//! DHAT heap profiler for refcache.
//!
//! Run with: cargo run --bin dhat_profile --release --features dhat-heap
//! View results: Open dhat-heap.json in <https://nnethercote.github.io/dh_view/dh_view.html>
//!
//! Every workload runs against a cache that is already constructed. The
//! allocation delta printed for each one should be zero: slots, bucket
//! chains and availability lists are all allocated up front.

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use refcache::builder::CacheBuilder;
use refcache::ds::bucket_table::BucketHash;
use refcache::item::Item;
use refcache::policy::refcount::RefcountCache;
use refcache::traits::{CacheItem, FinalizeCause, Finalizer};

const CAPACITY: usize = 4096;
const OPERATIONS: usize = 100_000;
const UNIVERSE: u64 = 16_384;

/// Simple XorShift64 RNG for deterministic workloads.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / (u64::MAX as f64);
        (self.next_u64() as f64) * SCALE
    }
}

/// Counts write-backs without allocating.
#[derive(Default)]
struct WriteBackCounter {
    written: u64,
    dropped: u64,
}

impl Finalizer<Item<u64, u64>> for WriteBackCounter {
    fn finalize(&mut self, item: Item<u64, u64>, _cause: FinalizeCause) {
        if item.is_dirty() {
            self.written += 1;
        } else {
            self.dropped += 1;
        }
    }
}

type Cache = RefcountCache<Item<u64, u64>, WriteBackCounter>;

/// Fetch-or-insert, touch, release. Every tenth access dirties the item.
fn access(cache: &mut Cache, key: u64, dirty: bool) {
    match cache.fetch(&key) {
        Some(item) => {
            if dirty {
                item.mark_dirty();
            }
        },
        None => {
            let mut item = Item::new(key, key);
            item.set_dirty(dirty);
            if let Err(err) = cache.insert(item) {
                let _ = cache.release_owned(err.into_item());
                return;
            }
        },
    }
    let _ = cache.release(&key);
}

/// Run a hotset workload: 90% of accesses hit 10% of keys.
fn hotset_workload(cache: &mut Cache, operations: usize, seed: u64) {
    let mut rng = XorShift64::new(seed);
    let hot_size = (UNIVERSE as f64 * 0.1) as u64;

    for i in 0..operations {
        let key = if rng.next_f64() < 0.9 {
            rng.next_u64() % hot_size
        } else {
            hot_size + (rng.next_u64() % (UNIVERSE - hot_size))
        };
        access(cache, key, i % 10 == 0);
    }
}

/// Run a scan workload: sequential access pattern.
fn scan_workload(cache: &mut Cache, operations: usize) {
    for i in 0..operations {
        access(cache, (i as u64) % UNIVERSE, false);
    }
}

/// Hold a window of pins open while churning through new keys.
fn pinned_window_workload(cache: &mut Cache, operations: usize, window: usize) {
    for i in 0..operations {
        let key = UNIVERSE + i as u64;
        if cache.insert(Item::dirty(key, key)).is_err() {
            continue;
        }
        if i >= window {
            let _ = cache.release(&(key - window as u64));
        }
    }
    cache.flush();
}

fn profile(name: &str, hash: BucketHash, workload: impl FnOnce(&mut Cache)) {
    println!("=== Profiling {} ===", name);
    let mut cache = CacheBuilder::new(CAPACITY)
        .bucket_hash(hash)
        .build(WriteBackCounter::default());

    let before = dhat::HeapStats::get();
    workload(&mut cache);
    let after = dhat::HeapStats::get();

    println!("  Final size: {}", cache.len());
    println!(
        "  Finalized: {} written back, {} dropped",
        cache.finalizer().written,
        cache.finalizer().dropped
    );
    println!(
        "  Allocations during workload: {} blocks, {} bytes",
        after.total_blocks - before.total_blocks,
        after.total_bytes - before.total_bytes
    );
}

fn main() {
    let _profiler = dhat::Profiler::new_heap();

    println!("refcache DHAT Heap Profiling");
    println!("============================\n");

    profile("hotset (modulo)", BucketHash::Modulo, |cache| {
        hotset_workload(cache, OPERATIONS, 42)
    });
    profile("hotset (murmur3)", BucketHash::Murmur3, |cache| {
        hotset_workload(cache, OPERATIONS, 42)
    });
    profile("scan", BucketHash::Modulo, |cache| {
        scan_workload(cache, OPERATIONS / 2)
    });
    profile("pinned window", BucketHash::Modulo, |cache| {
        pinned_window_workload(cache, OPERATIONS / 4, CAPACITY / 2)
    });

    println!("\n============================");
    println!("Profiling complete!");
    println!(
        "View results: Open dhat-heap.json in <https://nnethercote.github.io/dh_view/dh_view.html>"
    );
}
