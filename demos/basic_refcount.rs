use refcache::item::Item;
use refcache::policy::refcount::RefcountCache;
use refcache::traits::DropFinalizer;

fn main() {
    let mut cache = RefcountCache::new(2, DropFinalizer);

    cache.insert(Item::new(1u32, "alpha")).unwrap();
    cache.insert(Item::new(2u32, "beta")).unwrap();

    // both entries are pinned, nothing can be evicted
    let rejected = cache.insert(Item::new(3u32, "gamma")).unwrap_err();
    println!("insert 3 while full: {}", rejected);

    cache.release(&2).unwrap();
    cache.release(&1).unwrap();

    if let Some(item) = cache.fetch(&1) {
        println!("revived 1: {}", item.value());
    }
    cache.release(&1).unwrap();

    let inserted = cache.insert(Item::new(3u32, "gamma")).unwrap();
    println!("insert 3 evicted: {:?}", inserted.evicted.map(|(key, _)| key));
    println!("contains 2? {}", cache.contains(&2));
}

// Expected output:
// insert 3 while full: cache full: every entry is pinned
// revived 1: alpha
// insert 3 evicted: Some(2)
// contains 2? false
//
// Explanation: capacity=2 and both inserts hold a pin, so the third insert is
// rejected. Releasing 2 then 1 makes 2 the least recently released entry.
// Fetching 1 revives it and releasing it again keeps it the newest, so the
// next insert reclaims 2's slot.
