//! In-memory store backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::StoredEntry;
use crate::error::{CacheError, Result};
use crate::store::{Partition, PersistentStore};

// == Memory Store ==
/// Partitioned entries kept in process memory.
///
/// Nothing survives a restart. `MemoryStore::unavailable()` builds a store
/// whose medium is missing, for exercising degrade-to-miss paths.
#[derive(Debug)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<Partition, HashMap<String, StoredEntry>>>,
    available: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            available: true,
        }
    }

    /// A store that rejects every operation with `StorageUnavailable`.
    pub fn unavailable() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            available: false,
        }
    }

    /// Number of entries currently held in a partition.
    pub async fn len(&self, partition: Partition) -> usize {
        self.partitions
            .read()
            .await
            .get(&partition)
            .map_or(0, HashMap::len)
    }

    fn check(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(CacheError::StorageUnavailable(
                "in-memory store disabled".to_string(),
            ))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, partition: Partition, key: &str) -> Result<Option<StoredEntry>> {
        self.check()?;
        Ok(self
            .partitions
            .read()
            .await
            .get(&partition)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, partition: Partition, key: &str, entry: StoredEntry) -> Result<()> {
        self.check()?;
        self.partitions
            .write()
            .await
            .entry(partition)
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<()> {
        self.check()?;
        if let Some(entries) = self.partitions.write().await.get_mut(&partition) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, partition: Partition) -> Result<()> {
        self.check()?;
        self.partitions.write().await.remove(&partition);
        Ok(())
    }

    async fn list_all(&self, partition: Partition) -> Result<Vec<(String, StoredEntry)>> {
        self.check()?;
        Ok(self
            .partitions
            .read()
            .await
            .get(&partition)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
