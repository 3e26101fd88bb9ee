//! Clean and dirty availability lists.
//!
//! Two [`CircularList`]s over one [`LinkTable`] that is independent of the
//! bucket chains. Entries are pushed at the head when their pin count drops to
//! zero and taken from the tail for eviction, giving least-recently-released
//! order within each list.

use crate::ds::intrusive_list::{CircularList, CircularListIter, LinkTable};
use crate::ds::slot_arena::SlotId;
use crate::traits::Cleanliness;

#[derive(Debug)]
pub struct AvailabilityLists {
    links: LinkTable,
    clean: CircularList,
    dirty: CircularList,
}

impl AvailabilityLists {
    /// Creates both lists empty over `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            links: LinkTable::new(capacity),
            clean: CircularList::new(),
            dirty: CircularList::new(),
        }
    }

    /// Creates the lists with every slot in the clean list, slot 0 at the tail.
    pub fn all_clean(capacity: usize) -> Self {
        let mut lists = Self::new(capacity);
        lists.reset_all_clean();
        lists
    }

    /// Empties both lists, then puts every slot in the clean list with slot 0
    /// at the tail.
    pub fn reset_all_clean(&mut self) {
        self.clean = CircularList::new();
        self.dirty = CircularList::new();
        self.links.clear();
        for idx in 0..self.links.capacity() {
            self.clean.push_front(&mut self.links, SlotId(idx));
        }
    }

    pub fn len(&self, cleanliness: Cleanliness) -> usize {
        self.list(cleanliness).len()
    }

    /// Marks `id` as the most recently released entry of its list.
    pub fn push(&mut self, cleanliness: Cleanliness, id: SlotId) {
        match cleanliness {
            Cleanliness::Clean => self.clean.push_front(&mut self.links, id),
            Cleanliness::Dirty => self.dirty.push_front(&mut self.links, id),
        }
    }

    /// Removes `id` from the list it was pushed to with `cleanliness`.
    pub fn remove(&mut self, cleanliness: Cleanliness, id: SlotId) {
        match cleanliness {
            Cleanliness::Clean => self.clean.remove(&mut self.links, id),
            Cleanliness::Dirty => self.dirty.remove(&mut self.links, id),
        }
    }

    /// Takes the least recently released entry, clean before dirty.
    pub fn pop_victim(&mut self) -> Option<(SlotId, Cleanliness)> {
        if let Some(id) = self.clean.pop_back(&mut self.links) {
            return Some((id, Cleanliness::Clean));
        }
        self.dirty
            .pop_back(&mut self.links)
            .map(|id| (id, Cleanliness::Dirty))
    }

    /// Iterates one list from most to least recently released.
    pub fn iter(&self, cleanliness: Cleanliness) -> CircularListIter<'_> {
        self.list(cleanliness).iter(&self.links)
    }

    fn list(&self, cleanliness: Cleanliness) -> &CircularList {
        match cleanliness {
            Cleanliness::Clean => &self.clean,
            Cleanliness::Dirty => &self.dirty,
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.clean.debug_validate_invariants(&self.links);
        self.dirty.debug_validate_invariants(&self.links);
    }
}
