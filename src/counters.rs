//! Per-endpoint call counters and latency histograms.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Width of one latency histogram bucket, in milliseconds.
pub const BUCKET_WIDTH_MS: u128 = 10;

/// Counters for a single endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterEntry {
    /// Calls recorded, successful or not.
    pub call_count: u64,

    /// Calls that ended unsuccessfully.
    pub error_count: u64,

    /// Call count per latency bucket. The key is the elapsed time in
    /// milliseconds divided by [`BUCKET_WIDTH_MS`].
    pub histogram: BTreeMap<u64, u64>,
}

impl CounterEntry {
    /// Sum of all histogram buckets. Always equals `call_count`.
    pub fn histogram_total(&self) -> u64 {
        self.histogram.values().sum()
    }
}

/// Thread-safe counters keyed by endpoint URI.
///
/// Entries are never evicted; the number of distinct endpoints is small and
/// fixed.
#[derive(Debug, Default)]
pub struct Counters {
    entries: Mutex<HashMap<String, CounterEntry>>,
}

impl Counters {
    /// Creates an empty set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed call.
    pub fn record(&self, uri: &str, success: bool, elapsed: Duration) {
        let bucket = (elapsed.as_millis() / BUCKET_WIDTH_MS).min(u64::MAX as u128) as u64;

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(uri.to_string()).or_default();
        entry.call_count += 1;
        if !success {
            entry.error_count += 1;
        }
        *entry.histogram.entry(bucket).or_insert(0) += 1;
    }

    /// Returns a copy of the counters for `uri`, if any call was recorded.
    pub fn snapshot(&self, uri: &str) -> Option<CounterEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }

    /// Returns a copy of every endpoint's counters.
    pub fn snapshot_all(&self) -> HashMap<String, CounterEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
