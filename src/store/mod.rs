pub mod slab;

pub use slab::{Entry, EntrySlab, PinState, SlotState};
