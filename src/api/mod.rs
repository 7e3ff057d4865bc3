//! API Module
//!
//! Read-only HTTP diagnostics for the caches.
//!
//! # Endpoints
//! - `GET /health` - Cache health, degraded on low hit rate
//! - `GET /metrics` - Plaintext cumulative counters
//! - `GET /stats` - Full statistics snapshots
//! - `GET /popular` - Most requested images

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
