//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

const MIB: u64 = 1024 * 1024;

/// Capacity and expiry settings for one bounded store.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Feature flag; a disabled cache stores nothing
    pub enabled: bool,
    /// Maximum total payload bytes, 0 disables the cache
    pub max_bytes: u64,
    /// Maximum number of entries, 0 = unlimited
    pub max_entries: usize,
    /// TTL for entries stored without one, None = never expire
    pub default_ttl: Option<Duration>,
    /// Keys removed per write-lock acquisition during expiry sweeps
    pub cleanup_batch_size: usize,
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_bytes: 0,
            max_entries: 0,
            default_ttl: None,
            cleanup_batch_size: DEFAULT_CLEANUP_BATCH_SIZE,
        }
    }
}

const DEFAULT_CLEANUP_BATCH_SIZE: usize = 256;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Image bytes, thumbnails and variants
    pub image_cache: CacheConfig,
    /// Property lookups and search pages
    pub property_cache: CacheConfig,
    /// Default TTL for search-result pages
    pub search_ttl: Option<Duration>,
    /// Background expiry sweep interval
    pub cleanup_interval: Duration,
    /// HTTP port for the diagnostics endpoints
    pub server_port: u16,
    /// Hit rate (percent) under which the health check reports degraded
    pub health_min_hit_rate: f64,
    /// Lookups required before the hit rate is judged
    pub health_min_lookups: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `IMAGE_CACHE_ENABLED` - Enable the image cache (default: true)
    /// - `IMAGE_CACHE_MAX_BYTES` - Image cache capacity (default: 256 MiB)
    /// - `IMAGE_CACHE_MAX_ENTRIES` - Image entry limit, 0 = none (default: 0)
    /// - `IMAGE_CACHE_TTL` - Image TTL in seconds, 0 = none (default: 3600)
    /// - `PROPERTY_CACHE_ENABLED` - Enable the property cache (default: true)
    /// - `PROPERTY_CACHE_MAX_BYTES` - Property cache capacity (default: 64 MiB)
    /// - `PROPERTY_CACHE_MAX_ENTRIES` - Property entry limit (default: 10000)
    /// - `PROPERTY_CACHE_TTL` - Property TTL in seconds (default: 300)
    /// - `SEARCH_CACHE_TTL` - Search page TTL in seconds (default: 120)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `CLEANUP_BATCH_SIZE` - Keys removed per lock during sweeps (default: 256)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `HEALTH_MIN_HIT_RATE` - Degraded below this hit rate (default: 10.0)
    /// - `HEALTH_MIN_LOOKUPS` - Lookups before judging hit rate (default: 100)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let batch = parse_or(lookup("CLEANUP_BATCH_SIZE"), DEFAULT_CLEANUP_BATCH_SIZE);

        let image_cache = CacheConfig {
            enabled: bool_or(lookup("IMAGE_CACHE_ENABLED"), defaults.image_cache.enabled),
            max_bytes: parse_or(lookup("IMAGE_CACHE_MAX_BYTES"), defaults.image_cache.max_bytes),
            max_entries: parse_or(lookup("IMAGE_CACHE_MAX_ENTRIES"), defaults.image_cache.max_entries),
            default_ttl: ttl_or(lookup("IMAGE_CACHE_TTL"), defaults.image_cache.default_ttl),
            cleanup_batch_size: batch,
        };

        let property_cache = CacheConfig {
            enabled: bool_or(lookup("PROPERTY_CACHE_ENABLED"), defaults.property_cache.enabled),
            max_bytes: parse_or(lookup("PROPERTY_CACHE_MAX_BYTES"), defaults.property_cache.max_bytes),
            max_entries: parse_or(lookup("PROPERTY_CACHE_MAX_ENTRIES"), defaults.property_cache.max_entries),
            default_ttl: ttl_or(lookup("PROPERTY_CACHE_TTL"), defaults.property_cache.default_ttl),
            cleanup_batch_size: batch,
        };

        Self {
            image_cache,
            property_cache,
            search_ttl: ttl_or(lookup("SEARCH_CACHE_TTL"), defaults.search_ttl),
            cleanup_interval: Duration::from_secs(parse_or(
                lookup("CLEANUP_INTERVAL"),
                defaults.cleanup_interval.as_secs(),
            )),
            server_port: parse_or(lookup("SERVER_PORT"), defaults.server_port),
            health_min_hit_rate: parse_or(lookup("HEALTH_MIN_HIT_RATE"), defaults.health_min_hit_rate),
            health_min_lookups: parse_or(lookup("HEALTH_MIN_LOOKUPS"), defaults.health_min_lookups),
        }
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "CLEANUP_INTERVAL must be at least 1 second".to_string(),
            ));
        }
        if self.image_cache.cleanup_batch_size == 0 {
            return Err(CacheError::InvalidConfig(
                "CLEANUP_BATCH_SIZE must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.health_min_hit_rate) {
            return Err(CacheError::InvalidConfig(format!(
                "HEALTH_MIN_HIT_RATE must be within 0..=100, got {}",
                self.health_min_hit_rate
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_cache: CacheConfig {
                enabled: true,
                max_bytes: 256 * MIB,
                max_entries: 0,
                default_ttl: Some(Duration::from_secs(3600)),
                cleanup_batch_size: DEFAULT_CLEANUP_BATCH_SIZE,
            },
            property_cache: CacheConfig {
                enabled: true,
                max_bytes: 64 * MIB,
                max_entries: 10_000,
                default_ttl: Some(Duration::from_secs(300)),
                cleanup_batch_size: DEFAULT_CLEANUP_BATCH_SIZE,
            },
            search_ttl: Some(Duration::from_secs(120)),
            cleanup_interval: Duration::from_secs(60),
            server_port: 3000,
            health_min_hit_rate: 10.0,
            health_min_lookups: 100,
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn bool_or(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// TTLs are given in seconds; 0 means entries never expire.
fn ttl_or(value: Option<String>, default: Option<Duration>) -> Option<Duration> {
    match value.and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => default,
    }
}
