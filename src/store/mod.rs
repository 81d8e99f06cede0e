//! Persistent Store Module
//!
//! Durable key/value storage split into named partitions.
//!
//! # Backends
//! - [`FileStore`]: one directory per partition, one JSON file per entry
//! - [`MemoryStore`]: in-process maps, used for tests and ephemeral hosts

mod file;
mod memory;

use async_trait::async_trait;

use crate::cache::{StoredEntry, CONVERSATIONS, MESSAGES};
use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Partition ==
/// A named durable collection of entries.
///
/// Each cache namespace maps to exactly one partition; unknown namespaces
/// share the `Default` partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Conversations,
    Messages,
    Default,
}

impl Partition {
    /// Every partition, in sweep order.
    pub const ALL: [Partition; 3] = [
        Partition::Conversations,
        Partition::Messages,
        Partition::Default,
    ];

    /// Selects the partition for a namespace.
    pub fn for_namespace(namespace: &str) -> Self {
        match namespace {
            CONVERSATIONS => Partition::Conversations,
            MESSAGES => Partition::Messages,
            _ => Partition::Default,
        }
    }

    /// Storage name of the partition.
    pub fn name(&self) -> &'static str {
        match self {
            Partition::Conversations => CONVERSATIONS,
            Partition::Messages => MESSAGES,
            Partition::Default => "default",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// == Persistent Store ==
/// Durable partitioned key/value storage.
///
/// When the medium is missing every operation fails with
/// [`CacheError::StorageUnavailable`](crate::error::CacheError::StorageUnavailable).
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Fetches an entry, or `None` if the key is absent.
    async fn get(&self, partition: Partition, key: &str) -> Result<Option<StoredEntry>>;

    /// Stores an entry, replacing any previous one under the same key.
    async fn put(&self, partition: Partition, key: &str, entry: StoredEntry) -> Result<()>;

    /// Removes an entry. Removing an absent key succeeds.
    async fn delete(&self, partition: Partition, key: &str) -> Result<()>;

    /// Removes every entry in a partition.
    async fn clear(&self, partition: Partition) -> Result<()>;

    /// Lists every entry in a partition. Intended for maintenance sweeps.
    async fn list_all(&self, partition: Partition) -> Result<Vec<(String, StoredEntry)>>;

    /// Removes records in a partition that can no longer be read as entries,
    /// such as leftovers of an interrupted write. Returns how many went.
    ///
    /// Backends that cannot hold such records keep the default no-op.
    async fn purge_unreadable(&self, _partition: Partition) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_for_namespace() {
        assert_eq!(Partition::for_namespace("conversations"), Partition::Conversations);
        assert_eq!(Partition::for_namespace("messages"), Partition::Messages);
        assert_eq!(Partition::for_namespace("drafts"), Partition::Default);
        assert_eq!(Partition::for_namespace(""), Partition::Default);
    }

    #[test]
    fn test_partition_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            Partition::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), Partition::ALL.len());
    }
}
