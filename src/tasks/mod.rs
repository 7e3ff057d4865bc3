//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of the
//! process.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from every registered cache

mod cleanup;

pub use cleanup::{spawn_cleanup_task, ExpirySweep};
