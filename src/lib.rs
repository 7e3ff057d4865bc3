//! Listing Cache - in-process caching for a property-listing backend
//!
//! Bounded, thread-safe caches for image bytes (raw, thumbnails, variants)
//! and property lookups/search pages, with LRU eviction, TTL sweeping and
//! hit/miss telemetry.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{ImageCache, PropertyCache, SearchParams, StatsSnapshot};
pub use config::{CacheConfig, Config};
pub use tasks::{spawn_cleanup_task, ExpirySweep};
