//! Sealed Cache - an encrypted local cache for conversation data
//!
//! Persists conversation and message collections on disk, sealed with
//! AES-256-GCM under keys derived from the owning user's id, with TTL
//! expiration and owner-scoped invalidation. Every failure degrades to a
//! cache miss; the authoritative backend is always the fallback.

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use cache::{conversations_key, messages_key, CacheKey, CacheManager};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
