//! Write-back cache over an in-memory "disk".
//!
//! Run with: `RUST_LOG=refcache=debug cargo run --example write_back`

use std::collections::BTreeMap;

use refcache::builder::CacheBuilder;
use refcache::item::Item;
use refcache::traits::{CacheItem, FinalizeCause, Finalizer};
use tracing_subscriber::EnvFilter;

/// Persists dirty pages when they leave the cache.
#[derive(Debug, Default)]
struct Disk {
    pages: BTreeMap<u64, String>,
    writes: usize,
}

impl Disk {
    fn read(&self, page: u64) -> String {
        self.pages
            .get(&page)
            .cloned()
            .unwrap_or_else(|| format!("page-{}", page))
    }
}

impl Finalizer<Item<u64, String>> for Disk {
    fn finalize(&mut self, item: Item<u64, String>, cause: FinalizeCause) {
        if item.is_dirty() {
            let (page, contents, _) = item.into_parts();
            println!("write back page {} ({})", page, cause);
            self.pages.insert(page, contents);
            self.writes += 1;
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut cache = CacheBuilder::new(3).build(Disk::default());

    for page in [1u64, 2, 3, 1, 4, 2, 5, 1] {
        let hit = cache.fetch(&page).is_some();
        if !hit {
            let contents = cache.finalizer().read(page);
            if let Err(err) = cache.insert(Item::new(page, contents)) {
                println!("page {} not cached: {}", page, err);
                continue;
            }
        }

        // odd pages get modified while pinned
        if page % 2 == 1 {
            if let Some(item) = cache.leased_mut(&page) {
                item.value_mut().push('*');
                item.mark_dirty();
            }
        }
        println!("{} page {}", if hit { "hit " } else { "miss" }, page);
        let _ = cache.release(&page);
    }

    let report = cache.flush();
    println!(
        "flushed {} entries, {} write-backs total",
        report.finalized,
        cache.finalizer().writes
    );
    for (page, contents) in &cache.finalizer().pages {
        println!("disk page {}: {}", page, contents);
    }
}
