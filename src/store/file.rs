//! File-backed store.
//!
//! Layout under the root directory:
//! ```text
//! <root>/<partition>/<sha256(key) hex>.json
//! ```
//! Each file holds the original key next to the entry so listing needs no
//! reverse mapping. Writes land in a uniquely named temp file first and are
//! renamed into place, so readers only ever see whole entries.
//!
//! Files that no longer parse, and temp files older than a grace period, are
//! removed by [`PersistentStore::purge_unreadable`] during sweeps.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::StoredEntry;
use crate::error::{CacheError, Result};
use crate::store::{Partition, PersistentStore};

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Age after which a temp file is taken to be left behind by a crashed write.
pub const DEFAULT_TEMP_GRACE: Duration = Duration::from_secs(60);

/// On-disk record: the key plus the flattened entry fields.
#[derive(Debug, Serialize, Deserialize)]
struct EntryFile {
    key: String,
    #[serde(flatten)]
    entry: StoredEntry,
}

// == Store Handle ==
/// An opened, writable cache root.
#[derive(Debug)]
struct StoreHandle {
    root: PathBuf,
}

impl StoreHandle {
    /// Creates the root directory and checks that it accepts writes.
    async fn open(root: &Path) -> std::result::Result<Self, String> {
        fs::create_dir_all(root)
            .await
            .map_err(|e| format!("creating cache root {}: {e}", root.display()))?;

        let probe = root.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&probe, b"")
            .await
            .map_err(|e| format!("cache root {} is not writable: {e}", root.display()))?;
        let _ = fs::remove_file(&probe).await;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.name())
    }

    fn entry_path(&self, partition: Partition, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.partition_dir(partition)
            .join(format!("{}.{ENTRY_EXTENSION}", hex::encode(digest)))
    }
}

// == File Store ==
/// Durable store rooted at a directory.
///
/// The root is opened on first use. Concurrent first callers share one open
/// attempt, and its outcome (success or `StorageUnavailable`) holds for the
/// life of the store.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    handle: OnceCell<std::result::Result<StoreHandle, String>>,
    temp_grace: Duration,
}

impl FileStore {
    /// Creates a store rooted at `root`. No I/O happens until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handle: OnceCell::new(),
            temp_grace: DEFAULT_TEMP_GRACE,
        }
    }

    /// Sets how old a temp file must be before a purge removes it.
    pub fn with_temp_grace(mut self, grace: Duration) -> Self {
        self.temp_grace = grace;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn handle(&self) -> Result<&StoreHandle> {
        let opened = self
            .handle
            .get_or_init(|| async {
                let result = StoreHandle::open(&self.root).await;
                match &result {
                    Ok(_) => debug!("Opened cache store at {}", self.root.display()),
                    Err(e) => warn!("Cache store unavailable: {}", e),
                }
                result
            })
            .await;

        opened
            .as_ref()
            .map_err(|msg| CacheError::StorageUnavailable(msg.clone()))
    }

    async fn read_entry_file(path: &Path) -> Result<Option<EntryFile>> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::storage(
                    format!("reading entry file {}", path.display()),
                    e,
                ))
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| CacheError::storage(format!("corrupt entry file {}", path.display()), e))
    }

    /// True for an entry file that reads fine but does not parse.
    async fn is_unparseable(path: &Path) -> bool {
        match fs::read(path).await {
            Ok(content) => serde_json::from_slice::<EntryFile>(&content).is_err(),
            Err(_) => false,
        }
    }

    /// True for a temp file older than the grace period.
    async fn is_stale_temp(&self, dir_entry: &fs::DirEntry) -> bool {
        let Ok(modified) = dir_entry.metadata().await.and_then(|meta| meta.modified()) else {
            return false;
        };
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age >= self.temp_grace)
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get(&self, partition: Partition, key: &str) -> Result<Option<StoredEntry>> {
        let handle = self.handle().await?;
        let path = handle.entry_path(partition, key);

        // A digest collision would surface as a file holding another key
        Ok(Self::read_entry_file(&path)
            .await?
            .filter(|file| file.key == key)
            .map(|file| file.entry))
    }

    async fn put(&self, partition: Partition, key: &str, entry: StoredEntry) -> Result<()> {
        let handle = self.handle().await?;
        let dir = handle.partition_dir(partition);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::storage(format!("creating partition {partition}"), e))?;

        let record = EntryFile {
            key: key.to_string(),
            entry,
        };
        let content = serde_json::to_vec(&record)
            .map_err(|e| CacheError::storage("encoding entry", e))?;

        let path = handle.entry_path(partition, key);
        let temp = dir.join(format!("{}.{TEMP_EXTENSION}", Uuid::new_v4()));

        fs::write(&temp, content)
            .await
            .map_err(|e| CacheError::storage(format!("writing {}", temp.display()), e))?;

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::storage(
                format!("replacing {}", path.display()),
                e,
            ));
        }

        Ok(())
    }

    async fn delete(&self, partition: Partition, key: &str) -> Result<()> {
        let handle = self.handle().await?;
        let path = handle.entry_path(partition, key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::storage(
                format!("deleting {}", path.display()),
                e,
            )),
        }
    }

    async fn clear(&self, partition: Partition) -> Result<()> {
        let handle = self.handle().await?;
        let dir = handle.partition_dir(partition);

        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::storage(format!("clearing partition {partition}"), e)),
        }
    }

    async fn list_all(&self, partition: Partition) -> Result<Vec<(String, StoredEntry)>> {
        let handle = self.handle().await?;
        let dir = handle.partition_dir(partition);

        let mut dir_entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(CacheError::storage(
                    format!("listing partition {partition}"),
                    e,
                ))
            }
        };

        let mut entries = vec![];
        while let Some(dir_entry) = dir_entries
            .next_entry()
            .await
            .map_err(|e| CacheError::storage(format!("listing partition {partition}"), e))?
        {
            let path = dir_entry.path();
            if !path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                continue;
            }

            match Self::read_entry_file(&path).await {
                Ok(Some(file)) => entries.push((file.key, file.entry)),
                // Removed between listing and reading
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable cache entry: {}", e),
            }
        }

        Ok(entries)
    }

    async fn purge_unreadable(&self, partition: Partition) -> Result<usize> {
        let handle = self.handle().await?;
        let dir = handle.partition_dir(partition);

        let mut dir_entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(CacheError::storage(
                    format!("listing partition {partition}"),
                    e,
                ))
            }
        };

        let mut removed = 0;
        while let Some(dir_entry) = dir_entries
            .next_entry()
            .await
            .map_err(|e| CacheError::storage(format!("listing partition {partition}"), e))?
        {
            let path = dir_entry.path();
            let unreadable = match path.extension().and_then(|ext| ext.to_str()) {
                Some(ENTRY_EXTENSION) => Self::is_unparseable(&path).await,
                Some(TEMP_EXTENSION) => self.is_stale_temp(&dir_entry).await,
                _ => false,
            };
            if !unreadable {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed unreadable cache file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(blob: &str) -> StoredEntry {
        StoredEntry::new(blob.to_string(), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.put(Partition::Messages, "messages:u1:c1", entry("abc")).await.unwrap();
        let found = store.get(Partition::Messages, "messages:u1:c1").await.unwrap();
        assert_eq!(found.unwrap().blob, "abc");

        store.delete(Partition::Messages, "messages:u1:c1").await.unwrap();
        assert!(store.get(Partition::Messages, "messages:u1:c1").await.unwrap().is_none());

        // Second delete is a no-op
        store.delete(Partition::Messages, "messages:u1:c1").await.unwrap();
    }

    #[tokio::test]
    async fn test_partitions_use_separate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.put(Partition::Conversations, "k", entry("a")).await.unwrap();
        store.put(Partition::Messages, "k", entry("b")).await.unwrap();

        assert!(dir.path().join("conversations").is_dir());
        assert!(dir.path().join("messages").is_dir());

        store.clear(Partition::Messages).await.unwrap();
        assert!(store.get(Partition::Messages, "k").await.unwrap().is_none());
        assert_eq!(
            store.get(Partition::Conversations, "k").await.unwrap().unwrap().blob,
            "a"
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::new(dir.path());
            store.put(Partition::Default, "drafts:u1", entry("kept")).await.unwrap();
        }

        let reopened = FileStore::new(dir.path());
        let found = reopened.get(Partition::Default, "drafts:u1").await.unwrap();
        assert_eq!(found.unwrap().blob, "kept");
    }

    #[tokio::test]
    async fn test_list_all_skips_corrupt_and_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.put(Partition::Messages, "messages:u1:c1", entry("a")).await.unwrap();
        store.put(Partition::Messages, "messages:u1:c2", entry("b")).await.unwrap();

        let partition_dir = dir.path().join("messages");
        std::fs::write(partition_dir.join("garbage.json"), b"{not json").unwrap();
        std::fs::write(partition_dir.join("leftover.tmp"), b"{}").unwrap();

        let mut keys: Vec<String> = store
            .list_all(Partition::Messages)
            .await
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        keys.sort();

        assert_eq!(keys, vec!["messages:u1:c1", "messages:u1:c2"]);
    }

    #[tokio::test]
    async fn test_purge_removes_corrupt_and_stale_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).with_temp_grace(Duration::ZERO);

        store.put(Partition::Messages, "messages:u1:c1", entry("a")).await.unwrap();
        let partition_dir = dir.path().join("messages");
        std::fs::write(partition_dir.join("deadbeef.json"), br#"{"key":"messages:u1:c9","blo"#)
            .unwrap();
        std::fs::write(partition_dir.join("orphan.tmp"), b"{}").unwrap();

        assert_eq!(store.purge_unreadable(Partition::Messages).await.unwrap(), 2);

        assert!(!partition_dir.join("deadbeef.json").exists());
        assert!(!partition_dir.join("orphan.tmp").exists());
        let found = store.get(Partition::Messages, "messages:u1:c1").await.unwrap();
        assert_eq!(found.unwrap().blob, "a");
    }

    #[tokio::test]
    async fn test_purge_keeps_recent_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.put(Partition::Messages, "messages:u1:c1", entry("a")).await.unwrap();
        let in_flight = dir.path().join("messages").join("in-flight.tmp");
        std::fs::write(&in_flight, b"{}").unwrap();

        assert_eq!(store.purge_unreadable(Partition::Messages).await.unwrap(), 0);
        assert!(in_flight.exists());
        assert_eq!(store.purge_unreadable(Partition::Default).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_and_clear_missing_partition() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.list_all(Partition::Conversations).await.unwrap().is_empty());
        assert!(store.clear(Partition::Conversations).await.is_ok());
    }

    #[tokio::test]
    async fn test_unusable_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let store = FileStore::new(blocker.join("cache"));

        assert!(matches!(
            store.put(Partition::Default, "k", entry("a")).await,
            Err(CacheError::StorageUnavailable(_))
        ));
        assert!(matches!(
            store.get(Partition::Default, "k").await,
            Err(CacheError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_first_use_opens_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("lazy")));

        let mut handles = vec![];
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let key = format!("messages:u1:c{i}");
                store.put(Partition::Messages, &key, entry("x")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let first = store.handle().await.unwrap() as *const StoreHandle;
        let second = store.handle().await.unwrap() as *const StoreHandle;
        assert_eq!(first, second);
        assert_eq!(store.list_all(Partition::Messages).await.unwrap().len(), 16);
    }
}
