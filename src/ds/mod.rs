pub mod availability;
pub mod bucket_table;
pub mod intrusive_list;
pub mod slot_arena;

pub use availability::AvailabilityLists;
pub use bucket_table::{BucketHash, BucketTable};
pub use intrusive_list::{CircularList, CircularListIter, LinkTable};
pub use slot_arena::{SlotArena, SlotId};
