//! Cache Module
//!
//! Encrypted caching of conversation data with TTL expiration and
//! owner-scoped invalidation.

mod chat;
mod entry;
mod keys;
mod manager;
mod stats;
mod updates;


// Re-export public types
pub use entry::StoredEntry;
pub use keys::{
    conversations_key, messages_key, owned_by, resolve_partition, CacheKey, CONVERSATIONS,
    KEY_DELIMITER, MESSAGES,
};
pub use manager::CacheManager;
pub use stats::CacheStats;
pub use updates::{CacheUpdate, UpdateBus, UpdateKind, UpdateTracker};
