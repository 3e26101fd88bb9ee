use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::RefcountMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for cache metrics snapshots.
///
/// This exporter writes in the Prometheus text exposition format so it can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_counter(&self, name: &str, value: u64) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} counter", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn write_gauge(&self, name: &str, value: u64) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} gauge", name);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write> MetricsExporter<RefcountMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &RefcountMetricsSnapshot) {
        let counters = [
            ("get_calls_total", snapshot.get_calls),
            ("get_hits_total", snapshot.get_hits),
            ("get_misses_total", snapshot.get_misses),
            ("revivals_total", snapshot.revivals),
            ("insert_calls_total", snapshot.insert_calls),
            ("insert_new_total", snapshot.insert_new),
            ("insert_reused_total", snapshot.insert_reused),
            ("insert_full_total", snapshot.insert_full),
            ("insert_duplicate_total", snapshot.insert_duplicate),
            ("evicted_entries_total", snapshot.evicted_entries),
            ("evicted_clean_total", snapshot.evicted_clean),
            ("evicted_dirty_total", snapshot.evicted_dirty),
            ("release_calls_total", snapshot.release_calls),
            ("release_to_clean_total", snapshot.release_to_clean),
            ("release_to_dirty_total", snapshot.release_to_dirty),
            ("release_untracked_total", snapshot.release_untracked),
            ("release_underflows_total", snapshot.release_underflows),
            ("finalized_total", snapshot.finalized),
            ("flush_calls_total", snapshot.flush_calls),
            ("leaked_pins_total", snapshot.leaked_pins),
            ("peek_calls_total", snapshot.peek_calls),
            ("peek_found_total", snapshot.peek_found),
        ];
        for (suffix, value) in counters {
            self.write_counter(&self.metric_name(suffix), value);
        }

        let gauges = [
            ("capacity", snapshot.capacity),
            ("resident", snapshot.resident),
            ("pinned", snapshot.pinned),
            ("available_clean", snapshot.available_clean),
            ("available_dirty", snapshot.available_dirty),
        ];
        for (suffix, value) in gauges {
            self.write_gauge(&self.metric_name(suffix), value as u64);
        }
    }
}
