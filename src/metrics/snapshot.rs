#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefcountMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub revivals: u64, // hits that took an entry off an availability list

    pub insert_calls: u64,
    pub insert_new: u64,    // bound to a never-used slot
    pub insert_reused: u64, // bound to a slot whose old item was evicted
    pub insert_full: u64,
    pub insert_duplicate: u64,

    pub evicted_entries: u64,
    pub evicted_clean: u64,
    pub evicted_dirty: u64,

    pub release_calls: u64,
    pub release_to_clean: u64,
    pub release_to_dirty: u64,
    pub release_untracked: u64,
    pub release_underflows: u64,

    pub finalized: u64,
    pub flush_calls: u64,
    pub leaked_pins: u64,

    pub peek_calls: u64,
    pub peek_found: u64,

    // gauges captured at snapshot time
    pub capacity: usize,
    pub resident: usize,
    pub pinned: usize,
    pub available_clean: usize,
    pub available_dirty: usize,
}

impl RefcountMetricsSnapshot {
    /// Fraction of fetches that found their key, `0.0` before any fetch.
    pub fn hit_rate(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }
}
