#![no_main]

use std::cell::Cell;

use libfuzzer_sys::fuzz_target;
use refcache::builder::CacheBuilder;
use refcache::ds::BucketHash;
use refcache::item::Item;
use refcache::traits::FinalizeCause;

// Fuzz arbitrary insert/fetch/release/flush sequences on a RefcountCache
//
// The first byte picks capacity and bucket hash. Structural invariants are
// checked after every operation, and every accepted insert must be finalized
// exactly once by the time the cache is dropped.
fuzz_target!(|data: &[u8]| {
    let Some((&config, ops)) = data.split_first() else {
        return;
    };
    let capacity = usize::from(config & 0x0f) + 1;
    let hash = if config & 0x10 == 0 {
        BucketHash::Modulo
    } else {
        BucketHash::Murmur3
    };

    let finalized = Cell::new(0usize);
    let mut accepted = 0usize;
    {
        let mut cache = CacheBuilder::new(capacity).bucket_hash(hash).build(
            |_: Item<u16, u8>, cause: FinalizeCause| {
                if cause != FinalizeCause::Untracked {
                    finalized.set(finalized.get() + 1);
                }
            },
        );

        for pair in ops.chunks_exact(2) {
            let key = u16::from(pair[1] % 48);
            match pair[0] % 6 {
                0 | 1 => {
                    let mut item = Item::new(key, pair[0]);
                    item.set_dirty(pair[0] & 0x80 != 0);
                    match cache.insert(item) {
                        Ok(_) => accepted += 1,
                        Err(err) => {
                            let _ = cache.release_owned(err.into_item());
                        }
                    }
                }
                2 => {
                    if let Some(item) = cache.fetch(&key) {
                        if pair[0] & 0x40 != 0 {
                            item.mark_dirty();
                        }
                    }
                }
                3 | 4 => {
                    let before = cache.refcount(&key);
                    let result = cache.release(&key);
                    assert_eq!(result.is_err(), before == Some(0));
                }
                5 => {
                    let pinned = cache.pinned_len();
                    let report = cache.flush();
                    assert_eq!(report.leaked_pins, pinned);
                    assert!(cache.is_empty());
                }
                _ => unreachable!(),
            }

            if let Err(err) = cache.check_invariants() {
                panic!("{}", err);
            }
        }
    }
    assert_eq!(finalized.get(), accepted);
});
