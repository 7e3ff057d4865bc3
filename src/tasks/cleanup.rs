//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{ImageCache, PropertyCache};

/// A cache whose expired entries can be swept in the background.
pub trait ExpirySweep: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Removes expired entries and returns how many were removed.
    fn cleanup_expired(&self) -> usize;
}

impl ExpirySweep for ImageCache {
    fn name(&self) -> &'static str {
        "image"
    }

    fn cleanup_expired(&self) -> usize {
        ImageCache::cleanup_expired(self)
    }
}

impl ExpirySweep for PropertyCache {
    fn name(&self) -> &'static str {
        "property"
    }

    fn cleanup_expired(&self) -> usize {
        PropertyCache::cleanup_expired(self)
    }
}

/// Spawns a background task that periodically sweeps expired entries.
///
/// The first sweep runs one `interval` after spawning. The task exits once
/// `shutdown` is cancelled; each cache sweep removes entries in bounded
/// batches so readers are never blocked for a whole pass.
///
/// # Example
/// ```ignore
/// let token = CancellationToken::new();
/// let handle = spawn_cleanup_task(vec![image_cache.clone()], Duration::from_secs(60), token.clone());
/// // Later, during shutdown:
/// token.cancel();
/// handle.await?;
/// ```
pub fn spawn_cleanup_task(
    caches: Vec<Arc<dyn ExpirySweep>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs_f64(),
            caches = caches.len(),
            "starting expiry sweep task"
        );

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => sweep(&caches),
            }
        }

        info!("expiry sweep task stopped");
    })
}

fn sweep(caches: &[Arc<dyn ExpirySweep>]) {
    for cache in caches {
        let removed = cache.cleanup_expired();
        if removed > 0 {
            info!(cache = cache.name(), removed, "expiry sweep removed entries");
        } else {
            debug!(cache = cache.name(), "expiry sweep found nothing to remove");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn image_cache() -> Arc<ImageCache> {
        Arc::new(ImageCache::new(&CacheConfig {
            enabled: true,
            max_bytes: 1_000,
            max_entries: 0,
            default_ttl: Some(Duration::from_millis(50)),
            cleanup_batch_size: 4,
        }))
    }

    fn property_cache() -> Arc<PropertyCache> {
        Arc::new(PropertyCache::new(
            &CacheConfig {
                enabled: true,
                max_bytes: 1_000,
                max_entries: 0,
                default_ttl: None,
                cleanup_batch_size: 4,
            },
            None,
        ))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let images = image_cache();
        images.set("expire_soon", b"bytes", "image/png");

        let token = CancellationToken::new();
        let handle = spawn_cleanup_task(
            vec![images.clone() as Arc<dyn ExpirySweep>],
            Duration::from_millis(100),
            token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(images.size(), 0, "Expired entry should have been swept");
        assert_eq!(images.stats().expirations, 1);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let properties = property_cache();
        properties.set_property("p-1", &"listing", None);
        properties.set_property("p-2", &"listing", Some(Duration::from_secs(3600)));

        let token = CancellationToken::new();
        let handle = spawn_cleanup_task(
            vec![properties.clone() as Arc<dyn ExpirySweep>],
            Duration::from_millis(50),
            token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(properties.size(), 2, "Live entries should not be removed");
        assert_eq!(properties.get_property::<String>("p-1").as_deref(), Some("listing"));

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_cancel() {
        let token = CancellationToken::new();
        let handle = spawn_cleanup_task(
            vec![image_cache() as Arc<dyn ExpirySweep>],
            Duration::from_secs(60),
            token.clone(),
        );

        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should stop promptly after cancellation")
            .unwrap();
    }

    #[test]
    fn test_sweep_names() {
        assert_eq!(image_cache().name(), "image");
        assert_eq!(property_cache().name(), "property");
    }
}
