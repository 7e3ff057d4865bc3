//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming query strings.

use serde::Deserialize;

/// Upper bound on `limit` for the popularity endpoint
pub const MAX_POPULAR_LIMIT: usize = 100;

const DEFAULT_POPULAR_LIMIT: usize = 10;

/// Query string for GET /popular
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopularQuery {
    /// Number of images to return (default 10, capped at 100)
    pub limit: Option<usize>,
}

impl PopularQuery {
    /// Returns the effective limit after defaulting and capping.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_POPULAR_LIMIT)
            .min(MAX_POPULAR_LIMIT)
    }
}
