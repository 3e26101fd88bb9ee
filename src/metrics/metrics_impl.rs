use crate::metrics::cell::MetricsCell;
use crate::metrics::traits::{
    CoreMetricsRecorder, RefcountMetricsReadRecorder, RefcountMetricsRecorder,
};

#[derive(Debug, Default)]
pub struct RefcountMetrics {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub revivals: u64,
    pub insert_calls: u64,
    pub insert_new: u64,
    pub insert_reused: u64,
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
    pub peek_calls: MetricsCell,
    pub peek_found: MetricsCell,
}

impl RefcountMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CoreMetricsRecorder for RefcountMetrics {
    fn record_get_hit(&mut self) {
        self.get_calls += 1;
        self.get_hits += 1;
    }

    fn record_get_miss(&mut self) {
        self.get_calls += 1;
        self.get_misses += 1;
    }

    fn record_insert_call(&mut self) {
        self.insert_calls += 1;
    }

    fn record_insert_new(&mut self) {
        self.insert_new += 1;
    }

    fn record_evicted_entry(&mut self) {
        self.evicted_entries += 1;
    }

    fn record_clear(&mut self) {
        self.flush_calls += 1;
    }
}

impl RefcountMetricsRecorder for RefcountMetrics {
    fn record_revival(&mut self) {
        self.revivals += 1;
    }

    fn record_insert_reused(&mut self) {
        self.insert_reused += 1;
    }

    fn record_insert_full(&mut self) {
        self.insert_full += 1;
    }

    fn record_insert_duplicate(&mut self) {
        self.insert_duplicate += 1;
    }

    fn record_evicted_clean(&mut self) {
        self.evicted_clean += 1;
    }

    fn record_evicted_dirty(&mut self) {
        self.evicted_dirty += 1;
    }

    fn record_release_call(&mut self) {
        self.release_calls += 1;
    }

    fn record_release_to_clean(&mut self) {
        self.release_to_clean += 1;
    }

    fn record_release_to_dirty(&mut self) {
        self.release_to_dirty += 1;
    }

    fn record_release_untracked(&mut self) {
        self.release_untracked += 1;
    }

    fn record_release_underflow(&mut self) {
        self.release_underflows += 1;
    }

    fn record_finalized(&mut self) {
        self.finalized += 1;
    }

    fn record_leaked_pin(&mut self) {
        self.leaked_pins += 1;
    }
}

impl RefcountMetricsReadRecorder for &RefcountMetrics {
    fn record_peek_call(&self) {
        self.peek_calls.incr();
    }

    fn record_peek_found(&self) {
        self.peek_found.incr();
    }
}
