//! Cache Module
//!
//! Bounded in-memory caching with LRU eviction, TTL expiration and hit/miss
//! telemetry, plus the image and property caches built on top of it.

mod entry;
mod image;
mod lru;
mod popularity;
mod property;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{CacheEntry, CachedValue, EntryMetadata};
pub use image::{ImageCache, ImageKey};
pub use lru::LruTracker;
pub use popularity::{PopularImage, PopularityTracker};
pub use property::{PropertyCache, PropertyKey, SearchFingerprint, SearchParams};
pub use stats::{StatsCollector, StatsSnapshot};
pub use store::{BoundedStore, CacheStore, StoreObserver};
