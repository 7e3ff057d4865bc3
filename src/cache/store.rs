//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, byte
//! capacity accounting and TTL expiration.
//!
//! [`CacheStore`] is the single-threaded engine; [`BoundedStore`] wraps it in
//! one read-write lock and is the handle the caches share across threads.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CachedValue, EntryMetadata, LruTracker, StatsCollector, StatsSnapshot};
use crate::config::CacheConfig;

// == Store Observer ==
/// Receives entry lifecycle events from a store.
///
/// Callbacks run while the store's write lock is held, so they see events in
/// the order the store applied them. They must not call back into the store.
pub trait StoreObserver<K>: Send + Sync + fmt::Debug {
    /// `key` became live.
    fn on_insert(&self, key: &K);

    /// `key` left the store: deleted, evicted, expired, cleared or dropped by
    /// an oversized overwrite. Overwrites that succeed report nothing.
    fn on_remove(&self, key: &K);
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    /// Insertion sequence, disambiguates equal expiry instants in the index
    seq: u64,
}

// == Cache Store ==
/// Cache storage with LRU eviction, byte capacity and TTL support.
#[derive(Debug)]
pub struct CacheStore<K> {
    /// Key-entry storage
    entries: HashMap<K, Slot>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Entries with a TTL ordered by `(expires_at, seq)`
    expiry: BTreeMap<(u64, u64), K>,
    next_seq: u64,
    /// Lifetime counters, shared with the owning handle
    stats: Arc<StatsCollector>,
    observer: Option<Arc<dyn StoreObserver<K>>>,
    /// Sum of `size_bytes` over live entries
    current_bytes: u64,
    /// Maximum total payload bytes
    max_bytes: u64,
    /// Maximum number of entries, 0 = unlimited
    max_entries: usize,
    /// TTL applied when `set` is called without one
    default_ttl: Option<Duration>,
}

impl<K: Eq + Hash + Clone + Display> CacheStore<K> {
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `max_bytes` - Maximum total payload bytes the cache can hold
    /// * `max_entries` - Maximum number of entries, 0 for no entry limit
    /// * `default_ttl` - TTL for entries stored without an explicit TTL
    pub fn new(max_bytes: u64, max_entries: usize, default_ttl: Option<Duration>, stats: Arc<StatsCollector>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            expiry: BTreeMap::new(),
            next_seq: 0,
            stats,
            observer: None,
            current_bytes: 0,
            max_bytes,
            max_entries,
            default_ttl,
        }
    }

    /// Reports inserts and removals to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn StoreObserver<K>>) -> Self {
        self.observer = Some(observer);
        self
    }

    // == Set ==
    /// Stores a copy of `payload` under `key`.
    ///
    /// An existing entry for the key is replaced by a fresh one. Least
    /// recently used entries are evicted until the new entry fits. A payload
    /// larger than the whole capacity is not stored, and any previous value
    /// for the key is dropped so readers never observe it again.
    ///
    /// Returns whether the entry was stored.
    pub fn set(&mut self, key: K, payload: &[u8], content_type: &str, ttl: Option<Duration>) -> bool {
        let size = payload.len() as u64;
        let replaced = self.detach(&key).is_some();

        if size > self.max_bytes {
            debug!(%key, size, capacity = self.max_bytes, "entry exceeds cache capacity, not stored");
            if replaced {
                self.notify_remove(&key);
            }
            return false;
        }

        while self.needs_room_for(size) {
            let Some(victim) = self.lru.evict_oldest() else {
                break;
            };
            self.remove_entry(&victim);
            self.stats.record_eviction();
            debug!(key = %victim, "evicted least recently used entry");
        }

        let entry = CacheEntry::new(payload, content_type, ttl.or(self.default_ttl));
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(expires_at) = entry.expires_at {
            self.expiry.insert((expires_at, seq), key.clone());
        }
        self.current_bytes += entry.size_bytes;
        self.lru.touch(&key);
        if !replaced {
            if let Some(observer) = &self.observer {
                observer.on_insert(&key);
            }
        }
        self.entries.insert(key, Slot { entry, seq });
        true
    }

    fn needs_room_for(&self, size: u64) -> bool {
        self.current_bytes + size > self.max_bytes
            || (self.max_entries > 0 && self.entries.len() >= self.max_entries)
    }

    // == Get ==
    /// Retrieves a copy of the value stored under `key`.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &K) -> Option<CachedValue> {
        self.read_with(key, |entry| Some(entry.value()))
    }

    /// Reads the live entry under `key` through `read`.
    ///
    /// A hit is counted only when `read` returns a value. An entry `read`
    /// rejects is removed and counted as a miss, like an expired one.
    pub fn read_with<T, F>(&mut self, key: &K, read: F) -> Option<T>
    where
        F: FnOnce(&CacheEntry) -> Option<T>,
    {
        let now = current_timestamp_ms();
        let Some(expired) = self.entries.get(key).map(|slot| slot.entry.is_expired_at(now)) else {
            self.stats.record_miss();
            return None;
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_miss();
            self.stats.record_expirations(1);
            return None;
        }

        let value = self.entries.get_mut(key).and_then(|slot| {
            let value = read(&slot.entry)?;
            slot.entry.touch();
            Some(value)
        });

        match value {
            Some(value) => {
                self.lru.touch(key);
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.remove_entry(key);
                self.stats.record_miss();
                debug!(%key, "removed entry its reader rejected");
                None
            }
        }
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was removed.
    pub fn delete(&mut self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Drops every entry. Statistics counters are left untouched.
    pub fn clear(&mut self) {
        if let Some(observer) = &self.observer {
            for key in self.entries.keys() {
                observer.on_remove(key);
            }
        }
        self.entries.clear();
        self.lru.clear();
        self.expiry.clear();
        self.current_bytes = 0;
    }

    /// Removes every entry whose key matches `predicate`.
    pub fn remove_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        let doomed: Vec<K> = self.entries.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &doomed {
            self.remove_entry(key);
        }
        doomed.len()
    }

    // == Expiry ==
    /// Removes up to `limit` entries expired at `now`, earliest expiry first.
    ///
    /// Only due entries are visited, so the cost does not grow with entries
    /// that have no TTL or expire later.
    pub fn remove_expired(&mut self, now: u64, limit: usize) -> usize {
        let due: Vec<K> = self
            .expiry
            .range(..=(now, u64::MAX))
            .take(limit)
            .map(|(_, key)| key.clone())
            .collect();
        for key in &due {
            self.remove_entry(key);
        }
        due.len()
    }

    fn detach(&mut self, key: &K) -> Option<CacheEntry> {
        let Slot { entry, seq } = self.entries.remove(key)?;
        self.lru.remove(key);
        if let Some(expires_at) = entry.expires_at {
            self.expiry.remove(&(expires_at, seq));
        }
        self.current_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry> {
        let entry = self.detach(key)?;
        self.notify_remove(key);
        Some(entry)
    }

    fn notify_remove(&self, key: &K) {
        if let Some(observer) = &self.observer {
            observer.on_remove(key);
        }
    }

    /// Copies the bookkeeping of an entry without counting an access.
    pub fn metadata(&self, key: &K) -> Option<EntryMetadata> {
        self.entries.get(key).map(|slot| slot.entry.metadata())
    }

    /// Iterates keys from least to most recently used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> + '_ {
        self.lru.iter_oldest_first()
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the sum of live payload sizes.
    pub fn current_size(&self) -> u64 {
        self.current_bytes
    }

    pub fn capacity(&self) -> u64 {
        self.max_bytes
    }
}

// == Bounded Store ==
/// Thread-safe, capacity-bounded store.
///
/// Cloning yields another handle to the same entries and counters. A store
/// built from a disabled config reports every lookup as not found, ignores
/// writes and records no statistics.
#[derive(Debug)]
pub struct BoundedStore<K> {
    inner: Arc<RwLock<CacheStore<K>>>,
    stats: Arc<StatsCollector>,
    enabled: bool,
    cleanup_batch_size: usize,
}

impl<K> Clone for BoundedStore<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stats: Arc::clone(&self.stats),
            enabled: self.enabled,
            cleanup_batch_size: self.cleanup_batch_size,
        }
    }
}

impl<K: Eq + Hash + Clone + Display> BoundedStore<K> {
    /// Creates a store from per-cache configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a store that reports entry lifecycle events to `observer`.
    pub fn with_observer(config: &CacheConfig, observer: Arc<dyn StoreObserver<K>>) -> Self {
        Self::build(config, Some(observer))
    }

    fn build(config: &CacheConfig, observer: Option<Arc<dyn StoreObserver<K>>>) -> Self {
        let stats = Arc::new(StatsCollector::new());
        let mut inner = CacheStore::new(
            config.max_bytes,
            config.max_entries,
            config.default_ttl,
            Arc::clone(&stats),
        );
        if let Some(observer) = observer {
            inner = inner.with_observer(observer);
        }
        Self {
            inner: Arc::new(RwLock::new(inner)),
            stats,
            enabled: config.enabled && config.max_bytes > 0,
            cleanup_batch_size: config.cleanup_batch_size.max(1),
        }
    }

    /// Creates a store that never holds anything.
    pub fn disabled() -> Self {
        Self::new(&CacheConfig::disabled())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Retrieves a copy of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }
        self.inner.write().get(key)
    }

    /// Reads the entry under `key` through `read` without copying the
    /// payload; see [`CacheStore::read_with`]. `read` runs under the lock.
    pub fn read_with<T, F>(&self, key: &K, read: F) -> Option<T>
    where
        F: FnOnce(&CacheEntry) -> Option<T>,
    {
        if !self.enabled {
            return None;
        }
        self.inner.write().read_with(key, read)
    }

    /// Stores a copy of `payload`; `ttl = None` applies the default TTL.
    pub fn set(&self, key: K, payload: &[u8], content_type: &str, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }
        self.inner.write().set(key, payload, content_type, ttl);
    }

    pub fn delete(&self, key: &K) -> bool {
        self.enabled && self.inner.write().delete(key)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Removes every entry whose key matches `predicate`.
    pub fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        if !self.enabled {
            return 0;
        }
        self.inner.write().remove_where(predicate)
    }

    // == Cleanup Expired ==
    /// Removes entries expired at call time, in bounded batches.
    ///
    /// Each batch takes the write lock once and visits at most
    /// `cleanup_batch_size` due entries through the expiry index, so readers
    /// wait for one batch at most, never for a scan of the whole store.
    pub fn cleanup_expired(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        let now = current_timestamp_ms();

        let mut removed = 0;
        loop {
            let batch = self.inner.write().remove_expired(now, self.cleanup_batch_size);
            removed += batch;
            if batch < self.cleanup_batch_size {
                break;
            }
        }

        self.stats.record_expirations(removed as u64);
        removed
    }

    /// Copies the bookkeeping of an entry without counting an access.
    pub fn entry_metadata(&self, key: &K) -> Option<EntryMetadata> {
        self.inner.read().metadata(key)
    }

    /// Returns whether `key` is live, without touching recency or stats.
    pub fn contains(&self, key: &K) -> bool {
        let now = current_timestamp_ms();
        self.inner
            .read()
            .metadata(key)
            .is_some_and(|m| m.expires_at.map_or(true, |at| now < at))
    }

    /// Snapshot of live keys ordered from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.inner.read().keys_by_recency().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn current_size(&self) -> u64 {
        self.inner.read().current_size()
    }

    pub fn capacity(&self) -> u64 {
        self.inner.read().capacity()
    }

    /// Shared handle to this store's counters.
    pub fn stats_collector(&self) -> Arc<StatsCollector> {
        Arc::clone(&self.stats)
    }

    // == Stats ==
    /// Returns a point-in-time statistics snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        let (size, current_bytes, capacity) = {
            let store = self.inner.read();
            (store.len(), store.current_size(), store.capacity())
        };
        self.stats.snapshot(self.enabled, size, current_bytes, capacity)
    }
}
