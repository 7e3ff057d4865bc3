//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with byte accounting,
//! access metadata and TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

// == Cached Value ==
/// A caller-owned copy of a cached payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    /// Payload bytes
    pub data: Vec<u8>,
    /// MIME type stored alongside the payload
    pub content_type: String,
}

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
///
/// Entries never leave the store that created them; readers receive a
/// [`CachedValue`] or an [`EntryMetadata`] copy instead.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub payload: Vec<u8>,
    /// MIME type of the payload
    pub content_type: String,
    /// Bytes charged against the store capacity
    pub size_bytes: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last read or write timestamp (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Number of successful reads since creation
    pub access_count: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry, copying the payload.
    ///
    /// # Arguments
    /// * `payload` - Bytes to store
    /// * `content_type` - MIME type of the payload
    /// * `ttl` - Optional time to live
    pub fn new(payload: &[u8], content_type: &str, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl.map(|ttl| now.saturating_add(duration_ms(ttl)));

        Self {
            payload: payload.to_vec(),
            content_type: content_type.to_string(),
            size_bytes: payload.len() as u64,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the given instant.
    ///
    /// An entry is expired once `now >= expires_at`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self) {
        self.last_accessed_at = current_timestamp_ms().max(self.last_accessed_at);
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Returns a caller-owned copy of the payload.
    pub fn value(&self) -> CachedValue {
        CachedValue {
            data: self.payload.clone(),
            content_type: self.content_type.clone(),
        }
    }

    /// Returns a read-only snapshot of the entry metadata.
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            content_type: self.content_type.clone(),
            size_bytes: self.size_bytes,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            expires_at: self.expires_at,
        }
    }
}

// == Entry Metadata ==
/// Point-in-time copy of an entry's bookkeeping, without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryMetadata {
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: u64,
    pub last_accessed_at: u64,
    pub access_count: u64,
    pub expires_at: Option<u64>,
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn duration_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}
