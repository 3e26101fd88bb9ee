//! Entry slab: fixed slots and the per-entry state machine.
//!
//! Every slot of the cache lives here, allocated once at construction. A slot
//! never leaves the slab; it only changes state.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Entry Slab Layout                              │
//! │                                                                         │
//! │   entries (SlotArena<Entry<I>>, fixed length = capacity)                │
//! │   ┌────────┬──────────────────────────────────────────────────┐         │
//! │   │ SlotId │ SlotState                                        │         │
//! │   ├────────┼──────────────────────────────────────────────────┤         │
//! │   │ 0      │ Pinned    { item: key 7, refcount: 2 }           │         │
//! │   │ 1      │ Available { item: key 3, cleanliness: Dirty }    │         │
//! │   │ 2      │ Available { item: key 9, cleanliness: Clean }    │         │
//! │   │ 3      │ Empty                                            │         │
//! │   └────────┴──────────────────────────────────────────────────┘         │
//! │                                                                         │
//! │   pinned:   1      (gauge, kept in step with transitions)               │
//! │   resident: 3      (slots holding an item)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! Slot Lifecycle
//! ──────────────
//!
//!   [Empty] ──bind()──► [Pinned] ──unpin() to 0──► [Available]
//!      ▲                  ▲  │                          │
//!      │                  │  └──pin() / unpin() > 0     │
//!      │                  └─────────pin()───────────────┘
//!      │                  ▲                             │
//!      │                  └──bind() (evicts old item)───┘
//!      └──────────────take()──── any state
//! ```
//!
//! The slab knows nothing about bucket chains or availability lists; the
//! engine keeps those in step with the transitions reported here.

use std::mem;
use std::num::NonZeroU32;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::traits::{CacheItem, Cleanliness};

/// Contents of one slot.
#[derive(Debug, Default)]
pub enum SlotState<I> {
    /// Never used since construction or the last flush.
    #[default]
    Empty,
    /// Held by at least one caller; never an eviction candidate.
    Pinned { item: I, refcount: NonZeroU32 },
    /// Unpinned and waiting in the availability list named by `cleanliness`.
    Available { item: I, cleanliness: Cleanliness },
}

/// Public view of a slot's pin state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Empty,
    Pinned(u32),
    Available(Cleanliness),
}

/// One cache slot.
#[derive(Debug)]
pub struct Entry<I> {
    state: SlotState<I>,
}

impl<I> Default for Entry<I> {
    fn default() -> Self {
        Self {
            state: SlotState::Empty,
        }
    }
}

impl<I: CacheItem> Entry<I> {
    /// The held item's key; `None` for empty slots.
    pub fn key(&self) -> Option<I::Key> {
        self.item().map(CacheItem::key)
    }

    pub fn item(&self) -> Option<&I> {
        match &self.state {
            SlotState::Empty => None,
            SlotState::Pinned { item, .. } | SlotState::Available { item, .. } => Some(item),
        }
    }

    pub fn item_mut(&mut self) -> Option<&mut I> {
        match &mut self.state {
            SlotState::Empty => None,
            SlotState::Pinned { item, .. } | SlotState::Available { item, .. } => Some(item),
        }
    }

    pub fn refcount(&self) -> u32 {
        match &self.state {
            SlotState::Pinned { refcount, .. } => refcount.get(),
            _ => 0,
        }
    }

    pub fn pin_state(&self) -> PinState {
        match &self.state {
            SlotState::Empty => PinState::Empty,
            SlotState::Pinned { refcount, .. } => PinState::Pinned(refcount.get()),
            SlotState::Available { cleanliness, .. } => PinState::Available(*cleanliness),
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self.state, SlotState::Pinned { .. })
    }
}

/// Outcome of [`EntrySlab::pin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinTransition {
    /// The entry was already pinned; its count went up.
    Incremented(u32),
    /// The entry was available and must leave this availability list.
    Revived(Cleanliness),
}

/// Outcome of a successful [`EntrySlab::unpin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpinTransition {
    /// Other pins remain.
    StillPinned(u32),
    /// The count reached zero; the entry belongs in this availability list.
    Released(Cleanliness),
}

/// [`EntrySlab::unpin`] on a slot that holds no pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotPinned;

/// Fixed set of cache slots with pinned/resident gauges.
#[derive(Debug)]
pub struct EntrySlab<I> {
    entries: SlotArena<Entry<I>>,
    pinned: usize,
    resident: usize,
}

const ONE: NonZeroU32 = NonZeroU32::MIN;

impl<I: CacheItem> EntrySlab<I> {
    /// Allocates `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: SlotArena::from_fn(capacity, |_| Entry::default()),
            pinned: 0,
            resident: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of slots with a refcount above zero.
    pub fn pinned_len(&self) -> usize {
        self.pinned
    }

    /// Number of slots holding an item.
    pub fn resident_len(&self) -> usize {
        self.resident
    }

    pub fn entry(&self, id: SlotId) -> &Entry<I> {
        &self.entries[id]
    }

    pub fn entry_mut(&mut self, id: SlotId) -> &mut Entry<I> {
        &mut self.entries[id]
    }

    pub fn key(&self, id: SlotId) -> Option<I::Key> {
        self.entries[id].key()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &Entry<I>)> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl DoubleEndedIterator<Item = SlotId> + ExactSizeIterator {
        self.entries.ids()
    }

    /// Puts `item` into slot `id` with a refcount of one.
    ///
    /// Returns the item the slot held before, if any. The slot must not be
    /// pinned.
    pub fn bind(&mut self, id: SlotId, item: I) -> Option<I> {
        let previous = mem::replace(
            &mut self.entries[id].state,
            SlotState::Pinned { item, refcount: ONE },
        );
        self.pinned += 1;
        match previous {
            SlotState::Empty => {
                self.resident += 1;
                None
            },
            SlotState::Available { item, .. } => Some(item),
            SlotState::Pinned { item, .. } => {
                debug_assert!(false, "bind over a pinned slot {}", id.index());
                self.pinned -= 1;
                Some(item)
            },
        }
    }

    /// Adds one pin to a resident slot. Returns `None` for empty slots.
    ///
    /// # Panics
    ///
    /// Panics if the refcount would exceed `u32::MAX`.
    pub fn pin(&mut self, id: SlotId) -> Option<PinTransition> {
        let entry = &mut self.entries[id];
        let cleanliness = match &mut entry.state {
            SlotState::Empty => return None,
            SlotState::Pinned { refcount, .. } => {
                *refcount = match refcount.checked_add(1) {
                    Some(next) => next,
                    None => panic!("refcount overflow on slot {}", id.index()),
                };
                return Some(PinTransition::Incremented(refcount.get()));
            },
            SlotState::Available { cleanliness, .. } => *cleanliness,
        };
        if let SlotState::Available { item, .. } = mem::take(&mut entry.state) {
            entry.state = SlotState::Pinned { item, refcount: ONE };
        }
        self.pinned += 1;
        Some(PinTransition::Revived(cleanliness))
    }

    /// Removes one pin.
    ///
    /// When the count reaches zero the held item's dirty flag is read, and the
    /// slot becomes available under that cleanliness. Fails without changing
    /// anything if the slot is not pinned.
    pub fn unpin(&mut self, id: SlotId) -> Result<UnpinTransition, NotPinned> {
        let entry = &mut self.entries[id];
        match mem::take(&mut entry.state) {
            SlotState::Pinned { item, refcount } => {
                match NonZeroU32::new(refcount.get() - 1) {
                    Some(remaining) => {
                        entry.state = SlotState::Pinned {
                            item,
                            refcount: remaining,
                        };
                        Ok(UnpinTransition::StillPinned(remaining.get()))
                    },
                    None => {
                        let cleanliness = item.cleanliness();
                        entry.state = SlotState::Available { item, cleanliness };
                        self.pinned -= 1;
                        Ok(UnpinTransition::Released(cleanliness))
                    },
                }
            },
            other => {
                entry.state = other;
                Err(NotPinned)
            },
        }
    }

    /// Empties slot `id`, returning its item and the refcount it had.
    pub fn take(&mut self, id: SlotId) -> Option<(I, u32)> {
        match mem::take(&mut self.entries[id].state) {
            SlotState::Empty => None,
            SlotState::Pinned { item, refcount } => {
                self.pinned -= 1;
                self.resident -= 1;
                Some((item, refcount.get()))
            },
            SlotState::Available { item, .. } => {
                self.resident -= 1;
                Some((item, 0))
            },
        }
    }
}
