//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store invariants under arbitrary operation
//! sequences.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::cache::{BoundedStore, ImageCache, SearchParams};
use crate::config::CacheConfig;

// == Test Configuration ==
const TEST_CAPACITY: u64 = 512;

fn config(max_bytes: u64) -> CacheConfig {
    CacheConfig {
        enabled: true,
        max_bytes,
        max_entries: 0,
        default_ttl: None,
        cleanup_batch_size: 8,
    }
}

fn new_store(max_bytes: u64) -> BoundedStore<String> {
    BoundedStore::new(&config(max_bytes))
}

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

/// Generates payloads, occasionally larger than the test capacity
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        9 => prop::collection::vec(any::<u8>(), 0..128),
        1 => prop::collection::vec(any::<u8>(), 500..600),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, payload: Vec<u8> },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), payload_strategy()).prop_map(|(key, payload)| CacheOp::Set { key, payload }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn live_bytes(store: &BoundedStore<String>) -> u64 {
    store
        .keys_by_recency()
        .iter()
        .filter_map(|k| store.entry_metadata(k))
        .map(|m| m.size_bytes)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* sequence of operations, live bytes never exceed capacity and
    // the byte counter equals the sum of live entry sizes.
    #[test]
    fn prop_capacity_enforcement(ops in prop::collection::vec(cache_op_strategy(), 1..120)) {
        let store = new_store(TEST_CAPACITY);

        for op in ops {
            match op {
                CacheOp::Set { key, payload } => store.set(key, &payload, "application/octet-stream", None),
                CacheOp::Get { key } => { store.get(&key); }
                CacheOp::Delete { key } => { store.delete(&key); }
            }
            prop_assert!(store.current_size() <= TEST_CAPACITY);
            prop_assert_eq!(store.current_size(), live_bytes(&store));
            prop_assert_eq!(store.keys_by_recency().len(), store.len());
        }
    }

    // *For any* sequence of lookups, hits and misses match what the caller
    // observed, and the hit rate is 100*h/(h+m).
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let store = new_store(TEST_CAPACITY);
        let mut hits: u64 = 0;
        let mut misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, payload } => store.set(key, &payload, "a/b", None),
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => hits += 1,
                    None => misses += 1,
                },
                CacheOp::Delete { key } => { store.delete(&key); }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);
        let expected_rate = if hits + misses == 0 { 0.0 } else { 100.0 * hits as f64 / (hits + misses) as f64 };
        prop_assert!((stats.hit_rate_percent - expected_rate).abs() < 1e-9);
    }

    // *For any* payload that fits, a set followed by a get returns the same
    // bytes and content type.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let store = new_store(TEST_CAPACITY);
        store.set(key.clone(), &payload, "image/png", None);

        let value = store.get(&key).unwrap();
        prop_assert_eq!(value.data, payload);
        prop_assert_eq!(value.content_type, "image/png");
    }

    // *For any* store filled to capacity with equal-size entries, touching
    // the oldest entry makes the second oldest the next eviction victim.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::hash_set("[a-z]{3,8}", 3..10),
        entry_size in 1usize..32,
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let store = new_store((keys.len() * entry_size) as u64);

        for key in &keys {
            store.set(key.clone(), &vec![0; entry_size], "a/b", None);
        }
        prop_assert!(store.get(&keys[0]).is_some());

        store.set("NEW".to_string(), &vec![1; entry_size], "a/b", None);

        prop_assert!(store.contains(&keys[0]), "touched key was evicted");
        prop_assert!(!store.contains(&keys[1]), "least recently used key survived");
        for key in keys.iter().skip(2) {
            prop_assert!(store.contains(key));
        }
        prop_assert_eq!(store.stats().evictions, 1);
    }

    // *For any* mix of images and key families, invalidating one image removes
    // exactly its entries and reports that count.
    #[test]
    fn prop_invalidate_image_exact(
        entries in prop::collection::vec((0u8..4, 0u8..3, 1u32..5), 1..40),
        target in 0u8..4,
    ) {
        let cache = ImageCache::new(&config(1 << 20));
        let mut live: HashSet<(String, u8, u32)> = HashSet::new();

        for (image, family, param) in entries {
            let id = format!("img-{image}");
            match family {
                0 => {
                    cache.set(&id, b"raw", "image/jpeg");
                    live.insert((id, 0, 0));
                }
                1 => {
                    cache.set_thumbnail(&id, param * 100, b"thumb", "image/jpeg");
                    live.insert((id, 1, param));
                }
                _ => {
                    cache.set_variant(&id, param * 100, 100, 80, "webp", b"variant", "image/webp");
                    live.insert((id, 2, param));
                }
            }
        }

        let target_id = format!("img-{target}");
        let expected = live.iter().filter(|(id, _, _)| *id == target_id).count();
        let others = live.len() - expected;

        prop_assert_eq!(cache.invalidate_image(&target_id), expected);
        prop_assert_eq!(cache.size(), others);
    }

    // *For any* filter set, the fingerprint does not depend on insertion order.
    #[test]
    fn prop_fingerprint_order_independent(
        filters in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{1,6}", 0..6),
        query in "[a-z ]{0,20}",
    ) {
        let forward = filters.iter().fold(SearchParams::new(query.clone()), |p, (k, v)| p.filter(k.clone(), v.clone()));
        let reversed = filters.iter().rev().fold(SearchParams::new(query.clone()), |p, (k, v)| p.filter(k.clone(), v.clone()));
        let direct = SearchParams { query, filters: filters.clone(), ..SearchParams::default() };

        prop_assert_eq!(forward.fingerprint(), reversed.fingerprint());
        prop_assert_eq!(forward.fingerprint(), direct.fingerprint());
    }
}

// Popularity ranking over arbitrary access counts
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_popular_images_sorted(counts in prop::collection::vec(0usize..12, 1..8), limit in 0usize..10) {
        let cache = ImageCache::new(&config(1 << 20));
        let mut expected: HashMap<String, u64> = HashMap::new();

        for (i, n) in counts.iter().enumerate() {
            let id = format!("img-{i}");
            cache.set(&id, b"x", "image/jpeg");
            for _ in 0..*n {
                cache.get(&id);
            }
            if *n > 0 {
                expected.insert(id, *n as u64);
            }
        }

        let popular = cache.get_popular_images(limit);
        prop_assert_eq!(popular.len(), limit.min(expected.len()));
        for pair in popular.windows(2) {
            prop_assert!(pair[0].access_count >= pair[1].access_count);
        }
        for image in &popular {
            prop_assert_eq!(expected.get(&image.image_id).copied(), Some(image.access_count));
        }
    }
}
