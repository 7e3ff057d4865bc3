//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint. None of them mutate
//! cache contents.

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::cache::{ImageCache, PropertyCache, StatsSnapshot};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{CacheHealth, HealthResponse, PopularImagesResponse, PopularQuery, StatsResponse};

/// Thresholds applied by the health check.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub min_hit_rate: f64,
    pub min_lookups: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_hit_rate: 10.0,
            min_lookups: 100,
        }
    }
}

/// Application state shared across all handlers.
///
/// Holds handles to the caches built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub images: Arc<ImageCache>,
    pub properties: Arc<PropertyCache>,
    pub thresholds: HealthThresholds,
}

impl AppState {
    /// Creates a new AppState over existing caches.
    pub fn new(images: Arc<ImageCache>, properties: Arc<PropertyCache>) -> Self {
        Self {
            images,
            properties,
            thresholds: HealthThresholds::default(),
        }
    }

    /// Builds both caches and the health thresholds from the Config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            images: Arc::new(ImageCache::new(&config.image_cache)),
            properties: Arc::new(PropertyCache::new(&config.property_cache, config.search_ttl)),
            thresholds: HealthThresholds {
                min_hit_rate: config.health_min_hit_rate,
                min_lookups: config.health_min_lookups,
            },
        }
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Handler for GET /health
///
/// Always answers 200; a low hit rate is reported as `degraded`, not as a
/// failure.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let HealthThresholds {
        min_hit_rate,
        min_lookups,
    } = state.thresholds;

    Json(HealthResponse::new(
        CacheHealth::from_snapshot(&state.images.stats(), min_hit_rate, min_lookups),
        CacheHealth::from_snapshot(&state.properties.get_cache_stats(), min_hit_rate, min_lookups),
    ))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        image_cache: state.images.stats(),
        property_cache: state.properties.get_cache_stats(),
    })
}

/// Handler for GET /popular?limit=N
pub async fn popular_handler(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> Json<PopularImagesResponse> {
    Json(PopularImagesResponse {
        images: state.images.get_popular_images(query.effective_limit()),
    })
}

/// Handler for GET /metrics
///
/// Plaintext exposition of cumulative counters and current occupancy.
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let mut body = String::new();
    render_metrics(&mut body, "image_cache", &state.images.stats())?;
    render_metrics(&mut body, "property_cache", &state.properties.get_cache_stats())?;

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// Appends the metric lines for one cache to `out`.
pub fn render_metrics(out: &mut String, prefix: &str, stats: &StatsSnapshot) -> Result<()> {
    let counters = [
        ("hits_total", stats.hits),
        ("misses_total", stats.misses),
        ("evictions_total", stats.evictions),
        ("expirations_total", stats.expirations),
        ("search_hits_total", stats.search_hits),
        ("search_misses_total", stats.search_misses),
    ];
    let gauges = [
        ("enabled", u64::from(stats.enabled)),
        ("entries", stats.size as u64),
        ("bytes", stats.current_bytes),
        ("capacity_bytes", stats.capacity),
    ];

    let write = |out: &mut String, kind: &str, name: &str, value: u64| {
        writeln!(out, "# TYPE {prefix}_{name} {kind}\n{prefix}_{name} {value}")
            .map_err(|e| CacheError::Internal(e.to_string()))
    };
    for (name, value) in counters {
        write(out, "counter", name, value)?;
    }
    for (name, value) in gauges {
        write(out, "gauge", name, value)?;
    }
    let rates = [
        ("hit_rate_percent", stats.hit_rate_percent),
        ("search_hit_rate_percent", stats.search_hit_rate_percent()),
    ];
    for (name, value) in rates {
        writeln!(out, "# TYPE {prefix}_{name} gauge\n{prefix}_{name} {value:.2}")
            .map_err(|e| CacheError::Internal(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn state() -> AppState {
        let config = CacheConfig {
            enabled: true,
            max_bytes: 10_000,
            max_entries: 0,
            default_ttl: None,
            cleanup_batch_size: 16,
        };
        AppState::new(
            Arc::new(ImageCache::new(&config)),
            Arc::new(PropertyCache::new(&config, None)),
        )
    }

    #[tokio::test]
    async fn test_health_handler_healthy() {
        let response = health_handler(State(state())).await;
        assert_eq!(response.status, crate::models::HealthStatus::Healthy);
        assert!(response.image_cache.enabled);
    }

    #[tokio::test]
    async fn test_health_handler_degraded() {
        let state = state().with_thresholds(HealthThresholds {
            min_hit_rate: 50.0,
            min_lookups: 2,
        });
        state.images.get("missing-1");
        state.images.get("missing-2");

        let response = health_handler(State(state)).await;
        assert_eq!(response.status, crate::models::HealthStatus::Degraded);
        assert!(response.image_cache.degraded);
        assert!(!response.property_cache.degraded);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = state();
        state.images.set("img-1", b"abc", "image/png");
        state.images.get("img-1");

        let response = stats_handler(State(state)).await;
        assert_eq!(response.image_cache.hits, 1);
        assert_eq!(response.image_cache.current_bytes, 3);
        assert_eq!(response.property_cache.hits, 0);
    }

    #[tokio::test]
    async fn test_popular_handler() {
        let state = state();
        state.images.set("img-1", b"abc", "image/png");
        state.images.get("img-1");

        let response = popular_handler(State(state), Query(PopularQuery { limit: Some(5) })).await;
        assert_eq!(response.images.len(), 1);
        assert_eq!(response.images[0].image_id, "img-1");
    }

    #[test]
    fn test_render_metrics() {
        let state = state();
        state.images.get("missing");

        let mut out = String::new();
        render_metrics(&mut out, "image_cache", &state.images.stats()).unwrap();

        assert!(out.contains("# TYPE image_cache_misses_total counter\nimage_cache_misses_total 1\n"));
        assert!(out.contains("image_cache_hits_total 0\n"));
        assert!(out.contains("image_cache_capacity_bytes 10000\n"));
        assert!(out.contains("image_cache_enabled 1\n"));
        assert!(out.contains("image_cache_hit_rate_percent 0.00\n"));
        assert!(out.contains("# TYPE image_cache_search_hit_rate_percent gauge\n"));
    }
}
