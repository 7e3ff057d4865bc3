//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.
//! Counters are atomics so lookups never serialize on a stats lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Stats Collector ==
/// Lifetime counters for one store.
///
/// Counters describe process-lifetime behavior, so clearing the store does
/// not reset them.
#[derive(Debug, Default)]
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    search_hits: AtomicU64,
    search_misses: AtomicU64,
}

impl StatsCollector {
    // == Constructor ==
    /// Creates a new collector with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Records the outcome of a search-page lookup.
    pub fn record_search(&self, hit: bool) {
        if hit {
            self.search_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.search_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    // == Hit Rate ==
    /// Calculates the lifetime hit rate as a percentage.
    pub fn hit_rate_percent(&self) -> f64 {
        percent(self.hits(), self.hits() + self.misses())
    }

    // == Snapshot ==
    /// Copies the counters together with the store's current occupancy.
    pub fn snapshot(&self, enabled: bool, size: usize, current_bytes: u64, capacity: u64) -> StatsSnapshot {
        let hits = self.hits();
        let misses = self.misses();
        StatsSnapshot {
            enabled,
            hits,
            misses,
            search_hits: self.search_hits.load(Ordering::Relaxed),
            search_misses: self.search_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size,
            current_bytes,
            capacity,
            hit_rate_percent: percent(hits, hits + misses),
        }
    }
}

// == Stats Snapshot ==
/// Read-only, point-in-time copy of a store's statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Whether the owning cache accepts writes
    pub enabled: bool,
    /// Number of successful lookups
    pub hits: u64,
    /// Number of failed lookups (not found or expired)
    pub misses: u64,
    /// Search-page lookups that hit (also counted in `hits`)
    pub search_hits: u64,
    /// Search-page lookups that missed (also counted in `misses`)
    pub search_misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Live entry count
    pub size: usize,
    /// Live payload bytes
    pub current_bytes: u64,
    /// Byte capacity
    pub capacity: u64,
    /// `100 * hits / (hits + misses)`, 0 without lookups
    pub hit_rate_percent: f64,
}

impl StatsSnapshot {
    /// Total lookups observed.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Share of the byte capacity in use, as a percentage.
    pub fn usage_percent(&self) -> f64 {
        percent(self.current_bytes, self.capacity)
    }

    pub fn search_hit_rate_percent(&self) -> f64 {
        percent(self.search_hits, self.search_hits + self.search_misses)
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
