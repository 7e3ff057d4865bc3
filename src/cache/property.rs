//! Property Cache Module
//!
//! Caches single-property lookups and search-result pages. Values are domain
//! objects owned by the caller; they are stored as JSON so byte capacity
//! applies to them like any other payload.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::{BoundedStore, StatsSnapshot};
use crate::config::CacheConfig;
use crate::error::Result;

const JSON_CONTENT_TYPE: &str = "application/json";

// == Search Parameters ==
/// Parameters of a property search, as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    /// Free-text query
    pub query: String,
    /// Field filters such as `city` or `max_price`
    pub filters: BTreeMap<String, String>,
    /// Sort order, if any
    pub sort: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Returns the canonical form used for fingerprinting.
    ///
    /// The query is trimmed, lowercased and whitespace-collapsed; filter
    /// fields are lowercased, values trimmed, and empty filters dropped.
    pub fn normalized(&self) -> Self {
        let filters = self
            .filters
            .iter()
            .map(|(field, value)| (field.trim().to_lowercase(), value.trim().to_string()))
            .filter(|(field, value)| !field.is_empty() && !value.is_empty())
            .collect();

        let sort = self
            .sort
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Self {
            query: normalize_text(&self.query),
            filters,
            sort,
            page: self.page,
            page_size: self.page_size,
        }
    }

    // == Fingerprint ==
    /// Stable hash of the normalized parameters.
    pub fn fingerprint(&self) -> SearchFingerprint {
        let canonical = self.normalized();
        let mut hasher = Sha256::new();

        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(canonical.query.as_bytes());
        field(&(canonical.filters.len() as u64).to_le_bytes());
        for (name, value) in &canonical.filters {
            field(name.as_bytes());
            field(value.as_bytes());
        }
        field(canonical.sort.as_deref().unwrap_or_default().as_bytes());
        field(&canonical.page.to_le_bytes());
        field(&canonical.page_size.to_le_bytes());

        SearchFingerprint(hex::encode(hasher.finalize()))
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// == Search Fingerprint ==
/// Opaque cache key for one page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchFingerprint(String);

impl SearchFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&SearchParams> for SearchFingerprint {
    fn from(params: &SearchParams) -> Self {
        params.fingerprint()
    }
}

// == Property Key ==
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Property(String),
    Search(SearchFingerprint),
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(id) => write!(f, "property:{id}"),
            Self::Search(fingerprint) => write!(f, "search:{fingerprint}"),
        }
    }
}

// == Property Cache ==
/// Cache for property lookups and search-result pages.
///
/// Mutating a property invalidates only its own entry. Search pages are not
/// traced back to the properties they contain; they age out on their TTL.
#[derive(Debug)]
pub struct PropertyCache {
    store: BoundedStore<PropertyKey>,
    /// TTL for search pages stored without an explicit one
    search_ttl: Option<Duration>,
}

impl PropertyCache {
    pub fn new(config: &CacheConfig, search_ttl: Option<Duration>) -> Self {
        let cache = Self {
            store: BoundedStore::new(config),
            search_ttl,
        };
        info!(
            enabled = cache.is_enabled(),
            max_bytes = config.max_bytes,
            max_entries = config.max_entries,
            "property cache initialized"
        );
        cache
    }

    /// Null-object cache: never stores anything.
    pub fn disabled() -> Self {
        Self {
            store: BoundedStore::disabled(),
            search_ttl: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    // == Properties ==
    /// Returns the cached property, if present and decodable.
    pub fn get_property<T: DeserializeOwned>(&self, property_id: &str) -> Option<T> {
        let key = PropertyKey::Property(property_id.to_string());
        self.store.read_with(&key, |entry| decode_logged(&key, &entry.payload))
    }

    /// Caches a property; `ttl = None` applies the cache default TTL.
    pub fn set_property<T: Serialize>(&self, property_id: &str, property: &T, ttl: Option<Duration>) {
        self.insert(PropertyKey::Property(property_id.to_string()), property, ttl);
    }

    /// Drops the cached copy of a mutated or deleted property.
    pub fn invalidate_property(&self, property_id: &str) -> bool {
        let removed = self.store.delete(&PropertyKey::Property(property_id.to_string()));
        if removed {
            debug!(property_id, "invalidated cached property");
        }
        removed
    }

    // == Search Pages ==
    /// Returns the cached result page for `fingerprint`.
    pub fn get_search<T: DeserializeOwned>(&self, fingerprint: &SearchFingerprint) -> Option<T> {
        let key = PropertyKey::Search(fingerprint.clone());
        let page = self.store.read_with(&key, |entry| decode_logged(&key, &entry.payload));
        if self.is_enabled() {
            self.store.stats_collector().record_search(page.is_some());
        }
        page
    }

    /// Caches a result page; `ttl = None` applies the search TTL.
    pub fn set_search<T: Serialize>(&self, fingerprint: &SearchFingerprint, page: &T, ttl: Option<Duration>) {
        self.insert(PropertyKey::Search(fingerprint.clone()), page, ttl.or(self.search_ttl));
    }

    fn insert<T: Serialize>(&self, key: PropertyKey, value: &T, ttl: Option<Duration>) {
        if !self.is_enabled() {
            return;
        }
        match encode(value) {
            Ok(bytes) => self.store.set(key, &bytes, JSON_CONTENT_TYPE, ttl),
            Err(err) => warn!(%key, error = %err, "value not cached, encoding failed"),
        }
    }

    // == Maintenance ==
    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn cleanup_expired(&self) -> usize {
        self.store.cleanup_expired()
    }

    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn current_size(&self) -> u64 {
        self.store.current_size()
    }

    /// Statistics including search-page hits.
    pub fn get_cache_stats(&self) -> StatsSnapshot {
        self.store.stats()
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes a cached payload. A failure is logged; the store then drops the
/// entry and counts the lookup as a miss.
fn decode_logged<T: DeserializeOwned>(key: &PropertyKey, bytes: &[u8]) -> Option<T> {
    decode(bytes)
        .map_err(|err| warn!(%key, error = %err, "discarding cached value that no longer decodes"))
        .ok()
}
