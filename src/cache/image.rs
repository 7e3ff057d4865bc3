//! Image Cache Module
//!
//! Caches raw image bytes, fixed-size thumbnails and parametrized variants in
//! one bounded store, and ranks images by how often they are served.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{BoundedStore, CachedValue, PopularImage, PopularityTracker, StatsSnapshot, StoreObserver};
use crate::config::CacheConfig;

// == Image Key ==
/// Key families sharing the image cache keyspace.
///
/// Every family carries the image id, so invalidation matches on structure
/// instead of scanning string prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageKey {
    Raw {
        image_id: String,
    },
    Thumbnail {
        image_id: String,
        size: u32,
    },
    Variant {
        image_id: String,
        width: u32,
        height: u32,
        quality: u32,
        format: String,
    },
}

impl ImageKey {
    pub fn raw(image_id: &str) -> Option<Self> {
        valid_id(image_id).then(|| Self::Raw {
            image_id: image_id.to_string(),
        })
    }

    /// Builds a thumbnail key; `size` must be positive.
    pub fn thumbnail(image_id: &str, size: u32) -> Option<Self> {
        (valid_id(image_id) && size > 0).then(|| Self::Thumbnail {
            image_id: image_id.to_string(),
            size,
        })
    }

    /// Builds a variant key.
    ///
    /// Returns `None` for zero dimensions, quality outside `1..=100` or an
    /// empty format. Formats are case-insensitive.
    pub fn variant(image_id: &str, width: u32, height: u32, quality: u32, format: &str) -> Option<Self> {
        let format = format.trim().to_ascii_lowercase();
        let valid = valid_id(image_id)
            && width > 0
            && height > 0
            && (1..=100).contains(&quality)
            && !format.is_empty();

        valid.then(|| Self::Variant {
            image_id: image_id.to_string(),
            width,
            height,
            quality,
            format,
        })
    }

    /// The image every key family refers to.
    pub fn image_id(&self) -> &str {
        match self {
            Self::Raw { image_id } | Self::Thumbnail { image_id, .. } | Self::Variant { image_id, .. } => image_id,
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw { image_id } => write!(f, "raw:{image_id}"),
            Self::Thumbnail { image_id, size } => write!(f, "thumb:{image_id}:{size}"),
            Self::Variant {
                image_id,
                width,
                height,
                quality,
                format,
            } => write!(f, "variant:{image_id}:{width}x{height}:q{quality}:{format}"),
        }
    }
}

fn valid_id(image_id: &str) -> bool {
    !image_id.is_empty()
}

/// Popularity follows the store at image level: a row exists while any key
/// of the image is cached.
impl StoreObserver<ImageKey> for PopularityTracker {
    fn on_insert(&self, key: &ImageKey) {
        self.track(key.image_id());
    }

    fn on_remove(&self, key: &ImageKey) {
        self.untrack(key.image_id());
    }
}

// == Image Cache ==
/// Image bytes cache with thumbnails, variants and popularity ranking.
///
/// A disabled cache keeps the same interface: lookups miss and writes are
/// dropped, so callers need no separate code path.
#[derive(Debug)]
pub struct ImageCache {
    store: BoundedStore<ImageKey>,
    popularity: Arc<PopularityTracker>,
}

impl ImageCache {
    pub fn new(config: &CacheConfig) -> Self {
        let popularity = Arc::new(PopularityTracker::new());
        let observer = Arc::clone(&popularity) as Arc<dyn StoreObserver<ImageKey>>;
        let cache = Self {
            store: BoundedStore::with_observer(config, observer),
            popularity,
        };
        info!(
            enabled = cache.is_enabled(),
            max_bytes = config.max_bytes,
            max_entries = config.max_entries,
            "image cache initialized"
        );
        cache
    }

    /// Null-object cache: never stores anything.
    pub fn disabled() -> Self {
        Self {
            store: BoundedStore::disabled(),
            popularity: Arc::new(PopularityTracker::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.store.stats()
    }

    fn lookup(&self, key: Option<ImageKey>) -> Option<CachedValue> {
        let Some(key) = key else {
            debug!("rejected image lookup with invalid parameters");
            return None;
        };
        let value = self.store.get(&key)?;
        self.popularity.record(key.image_id());
        Some(value)
    }

    fn insert(&self, key: Option<ImageKey>, data: &[u8], content_type: &str) {
        match key {
            Some(key) => self.store.set(key, data, content_type, None),
            None => debug!("rejected image write with invalid parameters"),
        }
    }

    // == Raw Images ==
    /// Returns the raw bytes cached for `image_id`.
    pub fn get(&self, image_id: &str) -> Option<CachedValue> {
        self.lookup(ImageKey::raw(image_id))
    }

    /// Caches raw bytes for `image_id` with the configured default TTL.
    pub fn set(&self, image_id: &str, data: &[u8], content_type: &str) {
        self.insert(ImageKey::raw(image_id), data, content_type);
    }

    /// Removes the raw entry for `image_id`; thumbnails and variants stay.
    pub fn delete(&self, image_id: &str) -> bool {
        ImageKey::raw(image_id).is_some_and(|key| self.store.delete(&key))
    }

    /// Drops every entry and, with them, all popularity data.
    pub fn clear(&self) {
        self.store.clear();
    }

    // == Thumbnails ==
    pub fn get_thumbnail(&self, image_id: &str, size: u32) -> Option<CachedValue> {
        self.lookup(ImageKey::thumbnail(image_id, size))
    }

    pub fn set_thumbnail(&self, image_id: &str, size: u32, data: &[u8], content_type: &str) {
        self.insert(ImageKey::thumbnail(image_id, size), data, content_type);
    }

    // == Variants ==
    pub fn get_variant(&self, image_id: &str, width: u32, height: u32, quality: u32, format: &str) -> Option<CachedValue> {
        self.lookup(ImageKey::variant(image_id, width, height, quality, format))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_variant(
        &self,
        image_id: &str,
        width: u32,
        height: u32,
        quality: u32,
        format: &str,
        data: &[u8],
        content_type: &str,
    ) {
        self.insert(ImageKey::variant(image_id, width, height, quality, format), data, content_type);
    }

    // == Invalidation ==
    /// Removes the raw image, every thumbnail and every variant of
    /// `image_id`. Its popularity goes with the last key. Returns the count
    /// removed.
    pub fn invalidate_image(&self, image_id: &str) -> usize {
        let removed = self.store.remove_where(|key| key.image_id() == image_id);
        if removed > 0 {
            info!(image_id, removed, "invalidated cached image");
        }
        removed
    }

    pub fn size(&self) -> usize {
        self.store.len()
    }

    /// Live payload bytes.
    pub fn current_size(&self) -> u64 {
        self.store.current_size()
    }

    pub fn cleanup_expired(&self) -> usize {
        self.store.cleanup_expired()
    }

    // == Popularity ==
    /// Most requested cached images, aggregated over all key families.
    pub fn get_popular_images(&self, limit: usize) -> Vec<PopularImage> {
        self.popularity.top(limit)
    }
}
