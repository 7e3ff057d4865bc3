//! Popularity Tracker Module
//!
//! Per-image access counting used to rank the most requested images.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy)]
struct Popularity {
    count: u64,
    /// Value of the tracker sequence at the latest access
    last_access: u64,
    /// Cache keys of this image currently stored
    live_keys: usize,
}

/// One row of a popularity ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularImage {
    pub image_id: String,
    pub access_count: u64,
}

// == Popularity Tracker ==
/// Concurrent access counter keyed by image id.
///
/// An image has a row only while at least one of its keys is cached: `track`
/// and `untrack` follow the store, and `record` never creates a row. The
/// tracker therefore stays bounded by the cache contents, and accesses that
/// race with a removal are dropped.
///
/// Recency is ordered by a tracker-wide sequence number rather than the wall
/// clock, so two accesses in the same millisecond still rank deterministically.
#[derive(Debug, Default)]
pub struct PopularityTracker {
    counts: DashMap<String, Popularity>,
    sequence: AtomicU64,
}

impl PopularityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes that one more key of `image_id` is cached.
    pub fn track(&self, image_id: &str) {
        if let Some(mut entry) = self.counts.get_mut(image_id) {
            entry.live_keys += 1;
            return;
        }
        self.counts.entry(image_id.to_string()).or_default().live_keys += 1;
    }

    /// Notes that a key of `image_id` left the cache; the row goes with the
    /// last one.
    pub fn untrack(&self, image_id: &str) {
        let emptied = match self.counts.get_mut(image_id) {
            Some(mut entry) => {
                entry.live_keys = entry.live_keys.saturating_sub(1);
                entry.live_keys == 0
            }
            None => false,
        };
        if emptied {
            self.counts.remove_if(image_id, |_, p| p.live_keys == 0);
        }
    }

    /// Records one access to `image_id` if it is still cached.
    pub fn record(&self, image_id: &str) {
        if let Some(mut entry) = self.counts.get_mut(image_id) {
            entry.count += 1;
            entry.last_access = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        }
    }

    // == Top ==
    /// Returns up to `limit` accessed images by descending access count, ties
    /// broken by most recent access first.
    pub fn top(&self, limit: usize) -> Vec<PopularImage> {
        if limit == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<(String, Popularity)> = self
            .counts
            .iter()
            .filter(|item| item.value().count > 0)
            .map(|item| (item.key().clone(), *item.value()))
            .collect();

        ranked.sort_by(|(_, a), (_, b)| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_access.cmp(&a.last_access))
        });
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(image_id, p)| PopularImage {
                image_id,
                access_count: p.count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_n(tracker: &PopularityTracker, id: &str, n: usize) {
        for _ in 0..n {
            tracker.record(id);
        }
    }

    fn tracked(ids: &[&str]) -> PopularityTracker {
        let tracker = PopularityTracker::new();
        for id in ids {
            tracker.track(id);
        }
        tracker
    }

    #[test]
    fn test_top_orders_by_count_then_recency() {
        let tracker = tracked(&["ten", "seven-old", "two", "seven-new"]);
        record_n(&tracker, "ten", 10);
        record_n(&tracker, "seven-old", 7);
        record_n(&tracker, "two", 2);
        record_n(&tracker, "seven-new", 7);

        let top = tracker.top(3);
        let ids: Vec<&str> = top.iter().map(|p| p.image_id.as_str()).collect();
        assert_eq!(ids, vec!["ten", "seven-new", "seven-old"]);
        assert_eq!(top[0].access_count, 10);
        assert_eq!(top[1].access_count, 7);
    }

    #[test]
    fn test_top_limits_and_skips_unread() {
        let tracker = tracked(&["a", "b", "unread"]);
        record_n(&tracker, "a", 1);
        record_n(&tracker, "b", 2);

        assert!(tracker.top(0).is_empty());
        assert_eq!(tracker.top(10).len(), 2);
    }

    #[test]
    fn test_untracked_images_are_not_recorded() {
        let tracker = PopularityTracker::new();
        record_n(&tracker, "never-cached", 3);
        assert!(tracker.top(10).is_empty());
    }

    #[test]
    fn test_row_lives_until_last_key_leaves() {
        let tracker = tracked(&["img", "img"]);
        record_n(&tracker, "img", 2);

        tracker.untrack("img");
        assert_eq!(tracker.top(1)[0].access_count, 2);

        tracker.untrack("img");
        assert!(tracker.counts.is_empty());

        record_n(&tracker, "img", 1);
        assert!(tracker.counts.is_empty(), "late access must not revive the row");

        tracker.track("img");
        assert!(tracker.top(1).is_empty(), "re-cached image starts from zero");
    }

    #[test]
    fn test_concurrent_records_are_counted() {
        let tracker = tracked(&["shared"]);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| record_n(&tracker, "shared", 500));
            }
        });
        assert_eq!(tracker.top(1)[0].access_count, 4_000);
    }
}
