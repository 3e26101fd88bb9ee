//! Circular intrusive doubly linked lists over a fixed slot range.
//!
//! Links are not stored in the nodes themselves but in a [`LinkTable`]: one
//! optional `{ prev, next }` pair per [`SlotId`]. A [`CircularList`] is only a
//! head id and a length, so any number of disjoint lists can share one table,
//! and the same slot can sit in several lists at once as long as each role
//! (bucket chains, availability) has its own table.
//!
//! ## Architecture
//!
//! ```text
//!   LinkTable (one per role)
//!   ┌────────┬──────────────────────────────┐
//!   │ SlotId │ Option<Link { prev, next }>  │
//!   ├────────┼──────────────────────────────┤
//!   │ 0      │ Some { prev: 2, next: 1 }    │
//!   │ 1      │ Some { prev: 0, next: 2 }    │
//!   │ 2      │ Some { prev: 1, next: 0 }    │
//!   │ 3      │ None (not in any list)       │
//!   └────────┴──────────────────────────────┘
//!
//!   head ─► [0] ◄──► [1] ◄──► [2] ◄── tail (= head.prev)
//!            ▲                  │
//!            └──────────────────┘
//! ```
//!
//! ## Operations
//! - `push_front(id)`: link before the head and make `id` the new head
//! - `remove(id)`: unlink the sole, head or an interior node
//! - `pop_back()`: unlink the tail
//!
//! All of the above are O(1). `iter` is O(n).
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use crate::ds::slot_arena::SlotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    prev: SlotId,
    next: SlotId,
}

/// Link storage for one list role, indexed by [`SlotId`].
#[derive(Debug)]
pub struct LinkTable {
    links: Box<[Option<Link>]>,
}

impl LinkTable {
    /// Creates a table with `capacity` unlinked slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            links: vec![None; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if `id` is currently threaded into some list of this table.
    pub fn is_linked(&self, id: SlotId) -> bool {
        matches!(self.links.get(id.0), Some(Some(_)))
    }

    /// Unlinks every slot. Lists built on this table must be reset as well.
    pub fn clear(&mut self) {
        self.links.iter_mut().for_each(|link| *link = None);
    }

    fn get(&self, id: SlotId) -> Link {
        match self.links[id.0] {
            Some(link) => link,
            None => panic!("slot {} is not linked", id.0),
        }
    }

    fn set_next(&mut self, id: SlotId, next: SlotId) {
        if let Some(link) = self.links[id.0].as_mut() {
            link.next = next;
        }
    }

    fn set_prev(&mut self, id: SlotId, prev: SlotId) {
        if let Some(link) = self.links[id.0].as_mut() {
            link.prev = prev;
        }
    }
}

/// A circular list threaded through a [`LinkTable`].
///
/// The list does not own its table; every mutating call takes the table it
/// was built on. Passing a different table is a logic error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CircularList {
    head: Option<SlotId>,
    len: usize,
}

impl CircularList {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Returns the tail, the node just before the head.
    pub fn back(&self, links: &LinkTable) -> Option<SlotId> {
        self.head.map(|head| links.get(head).prev)
    }

    /// Links `id` in as the new head.
    pub fn push_front(&mut self, links: &mut LinkTable, id: SlotId) {
        debug_assert!(!links.is_linked(id), "slot {} is already linked", id.0);
        match self.head {
            None => {
                links.links[id.0] = Some(Link { prev: id, next: id });
            },
            Some(head) => {
                let tail = links.get(head).prev;
                links.links[id.0] = Some(Link {
                    prev: tail,
                    next: head,
                });
                links.set_next(tail, id);
                links.set_prev(head, id);
            },
        }
        self.head = Some(id);
        self.len += 1;
    }

    /// Unlinks `id`, which must be a member of this list.
    pub fn remove(&mut self, links: &mut LinkTable, id: SlotId) {
        debug_assert!(self.head.is_some(), "remove from empty list");
        let Link { prev, next } = links.get(id);

        if next == id {
            self.head = None;
        } else {
            links.set_next(prev, next);
            links.set_prev(next, prev);
            if self.head == Some(id) {
                self.head = Some(next);
            }
        }

        links.links[id.0] = None;
        self.len -= 1;
    }

    /// Unlinks and returns the tail.
    pub fn pop_back(&mut self, links: &mut LinkTable) -> Option<SlotId> {
        let tail = self.back(links)?;
        self.remove(links, tail);
        Some(tail)
    }

    /// Iterates from head to tail.
    pub fn iter<'a>(&self, links: &'a LinkTable) -> CircularListIter<'a> {
        CircularListIter {
            links,
            head: self.head,
            current: self.head,
            remaining: self.len,
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self, links: &LinkTable) {
        let Some(head) = self.head else {
            assert_eq!(self.len, 0);
            return;
        };

        let mut seen = rustc_hash::FxHashSet::default();
        let mut current = head;
        let mut count = 0usize;
        loop {
            assert!(seen.insert(current), "cycle does not return to head");
            let link = links.get(current);
            assert_eq!(links.get(link.next).prev, current);
            assert_eq!(links.get(link.prev).next, current);
            count += 1;
            assert!(count <= self.len);
            current = link.next;
            if current == head {
                break;
            }
        }
        assert_eq!(count, self.len);
    }
}

/// Iterator over SlotIds from head to tail.
pub struct CircularListIter<'a> {
    links: &'a LinkTable,
    head: Option<SlotId>,
    current: Option<SlotId>,
    remaining: usize,
}

impl Iterator for CircularListIter<'_> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        let id = self.current?;
        self.remaining = self.remaining.saturating_sub(1);
        let next = self.links.get(id).next;
        self.current = if Some(next) == self.head || self.remaining == 0 {
            None
        } else {
            Some(next)
        };
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
