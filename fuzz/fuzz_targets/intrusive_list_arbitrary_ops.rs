#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use refcache::ds::{CircularList, LinkTable, SlotArena, SlotId};

const SLOTS: usize = 32;

// Fuzz arbitrary operation sequences on two CircularLists sharing one LinkTable
//
// Mirrors every operation on a VecDeque model per list and compares the
// head-to-tail order after each step.
fuzz_target!(|data: &[u8]| {
    let ids: Vec<SlotId> = SlotArena::from_fn(SLOTS, |_| ()).ids().collect();
    let mut links = LinkTable::new(SLOTS);
    let mut lists = [CircularList::new(), CircularList::new()];
    let mut models: [VecDeque<SlotId>; 2] = [VecDeque::new(), VecDeque::new()];

    for pair in data.chunks_exact(2) {
        let which = usize::from(pair[0] & 1);
        let op = (pair[0] >> 1) % 3;
        let id = ids[usize::from(pair[1]) % SLOTS];
        let list = &mut lists[which];
        let model = &mut models[which];

        match op {
            0 => {
                if !links.is_linked(id) {
                    list.push_front(&mut links, id);
                    model.push_front(id);
                    assert_eq!(list.iter(&links).next(), Some(id));
                }
            }
            1 => {
                assert_eq!(list.pop_back(&mut links), model.pop_back());
            }
            2 => {
                if let Some(pos) = model.iter().position(|&m| m == id) {
                    list.remove(&mut links, id);
                    model.remove(pos);
                    assert!(!links.is_linked(id));
                }
            }
            _ => unreachable!(),
        }

        for (list, model) in lists.iter().zip(models.iter()) {
            assert_eq!(list.len(), model.len());
            assert_eq!(list.is_empty(), model.is_empty());
            assert!(list.iter(&links).eq(model.iter().copied()));
        }
    }
});
