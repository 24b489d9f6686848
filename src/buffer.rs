//! Sliding time-window buffer shared by all ingestion workers and the
//! poll endpoint
//!
//! Entries are `(arrival, hit)` pairs in arrival order. Eviction is a
//! lazy prefix trim, run on every append and every query, so the window
//! invariant holds at each observation point without a background task.
//! A single mutex guards append, evict and query.

use crate::hit::{Hit, epoch_seconds};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    arrival: f64,
    hit: Hit,
}

/// Thread-safe sliding window of recent hits.
///
/// The `_at` variants take an explicit clock reading so tests can drive
/// simulated time; `append`/`query` read the wall clock.
pub struct SlidingBuffer {
    entries: Mutex<VecDeque<Entry>>,
    window: f64,
    stats: BufferStats,
}

/// Counters for buffer monitoring
#[derive(Default)]
pub struct BufferStats {
    /// Total hits appended
    pub appended: AtomicU64,
    /// Total hits evicted by the window
    pub evicted: AtomicU64,
}

impl SlidingBuffer {
    /// Create a buffer with the given retention window.
    pub fn new(window: Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            window: window.as_secs_f64(),
            stats: BufferStats::default(),
        }
    }

    /// Append a hit timestamped now.
    ///
    /// Returns the number of entries evicted while holding the lock.
    pub fn append(&self, hit: Hit) -> usize {
        self.append_at(epoch_seconds(), hit)
    }

    /// Append a hit at an explicit clock reading.
    pub fn append_at(&self, now: f64, hit: Hit) -> usize {
        let mut entries = self.entries.lock();
        let evicted = self.evict_expired(&mut entries, now);

        // Arrival times stay non-decreasing even if the wall clock slips
        // behind a concurrent appender's reading.
        let arrival = match entries.back() {
            Some(tail) => now.max(tail.arrival),
            None => now,
        };
        entries.push_back(Entry { arrival, hit });

        self.stats.appended.fetch_add(1, Ordering::Relaxed);
        self.stats.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Return every retained hit with `arrival > since`, in arrival order.
    pub fn query(&self, since: f64) -> Vec<Hit> {
        self.query_at(epoch_seconds(), since)
    }

    /// Query at an explicit clock reading.
    ///
    /// A `since` in the future yields an empty result; that is a correct
    /// answer, not an error.
    pub fn query_at(&self, now: f64, since: f64) -> Vec<Hit> {
        let mut entries = self.entries.lock();
        let evicted = self.evict_expired(&mut entries, now);
        self.stats.evicted.fetch_add(evicted as u64, Ordering::Relaxed);

        entries
            .iter()
            .filter(|entry| entry.arrival > since)
            .map(|entry| entry.hit.clone())
            .collect()
    }

    /// Prefix-trim every entry older than `now - window`. Entries are in
    /// arrival order, so the first retained entry marks the new head.
    fn evict_expired(&self, entries: &mut VecDeque<Entry>, now: f64) -> usize {
        let cutoff = now - self.window;
        let mut evicted = 0;
        while entries.front().is_some_and(|entry| entry.arrival < cutoff) {
            entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Current number of retained entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Retention window in seconds
    pub fn window_secs(&self) -> f64 {
        self.window
    }

    /// Total hits appended over the buffer's lifetime
    pub fn total_appended(&self) -> u64 {
        self.stats.appended.load(Ordering::Relaxed)
    }

    /// Total hits evicted over the buffer's lifetime
    pub fn total_evicted(&self) -> u64 {
        self.stats.evicted.load(Ordering::Relaxed)
    }
}
