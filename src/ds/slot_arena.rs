//! Fixed-length arena addressed by [`SlotId`].
//!
//! Every slot is allocated once, at construction. Slots are never added or
//! removed afterwards; callers reuse them by overwriting their contents. This
//! is the only storage the cache engine draws entries from.

use std::ops::{Index, IndexMut};

/// Stable index of a slot in a [`SlotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Box<[T]>,
}

impl<T> SlotArena<T> {
    /// Allocates `len` slots, each initialised by `init(slot_id)`.
    pub fn from_fn(len: usize, mut init: impl FnMut(SlotId) -> T) -> Self {
        Self {
            slots: (0..len).map(|idx| init(SlotId(idx))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns every slot id in index order.
    pub fn ids(&self) -> impl DoubleEndedIterator<Item = SlotId> + ExactSizeIterator {
        (0..self.slots.len()).map(SlotId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (SlotId(idx), slot))
    }
}

impl<T> Index<SlotId> for SlotArena<T> {
    type Output = T;

    fn index(&self, id: SlotId) -> &T {
        &self.slots[id.0]
    }
}

impl<T> IndexMut<SlotId> for SlotArena<T> {
    fn index_mut(&mut self, id: SlotId) -> &mut T {
        &mut self.slots[id.0]
    }
}
