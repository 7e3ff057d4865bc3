//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{PopularImage, StatsSnapshot};

/// Overall service status reported by GET /health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Health summary of one cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub enabled: bool,
    pub hit_rate_percent: f64,
    /// Share of byte capacity in use
    pub usage_percent: f64,
    pub size: usize,
    pub capacity: u64,
    /// Whether the hit rate is below the configured floor
    pub degraded: bool,
}

impl CacheHealth {
    /// Judges a snapshot: an enabled cache with at least `min_lookups`
    /// lookups and a hit rate under `min_hit_rate` is degraded.
    pub fn from_snapshot(stats: &StatsSnapshot, min_hit_rate: f64, min_lookups: u64) -> Self {
        let degraded = stats.enabled
            && stats.lookups() >= min_lookups
            && stats.hit_rate_percent < min_hit_rate;
        Self {
            enabled: stats.enabled,
            hit_rate_percent: stats.hit_rate_percent,
            usage_percent: stats.usage_percent(),
            size: stats.size,
            capacity: stats.capacity,
            degraded,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub image_cache: CacheHealth,
    pub property_cache: CacheHealth,
}

impl HealthResponse {
    /// Creates a HealthResponse with the current timestamp.
    pub fn new(image_cache: CacheHealth, property_cache: CacheHealth) -> Self {
        let status = if image_cache.degraded || property_cache.degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        Self {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            image_cache,
            property_cache,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub image_cache: StatsSnapshot,
    pub property_cache: StatsSnapshot,
}

/// Response body for GET /popular
#[derive(Debug, Clone, Serialize)]
pub struct PopularImagesResponse {
    pub images: Vec<PopularImage>,
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
