//! Cache Manager Module
//!
//! Ties key resolution, TTL enforcement, encryption and storage together.
//!
//! The cache is advisory: reads and sweeps never fail, they miss. Writes
//! report real failures so the caller can decide whether to retry, but hosts
//! without crypto or storage get a no-op success instead.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::cache::{
    owned_by, CacheKey, CacheStats, CacheUpdate, StoredEntry, UpdateBus, UpdateKind,
};
use crate::config::Config;
use crate::crypto::AuthenticatedCipher;
use crate::error::{CacheError, Result};
use crate::store::{FileStore, Partition, PersistentStore};

// == Cache Manager ==
/// Encrypted, expiring cache over a [`PersistentStore`].
pub struct CacheManager {
    store: Arc<dyn PersistentStore>,
    cipher: AuthenticatedCipher,
    default_ttl: Duration,
    stats: RwLock<CacheStats>,
    /// Latched once the host reports missing crypto primitives
    crypto_disabled: AtomicBool,
    updates: UpdateBus,
}

impl CacheManager {
    // == Constructors ==
    /// Creates a manager over `store` with the default cipher and a 7 day TTL.
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self {
            store,
            cipher: AuthenticatedCipher::new(),
            default_ttl: Duration::from_secs(crate::config::DEFAULT_TTL_SECS),
            stats: RwLock::new(CacheStats::new()),
            crypto_disabled: AtomicBool::new(false),
            updates: UpdateBus::new(),
        }
    }

    /// Creates a manager over a [`FileStore`] at the configured directory.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(FileStore::new(&config.cache_dir)))
            .with_default_ttl(config.default_ttl())
    }

    pub fn with_cipher(mut self, cipher: AuthenticatedCipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// True once crypto has been found unsupported; the cache then always misses.
    pub fn is_disabled(&self) -> bool {
        self.crypto_disabled.load(Ordering::Acquire)
    }

    /// Returns a snapshot of the cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Subscribes to write and invalidation notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.updates.subscribe()
    }

    // == Read ==
    /// Returns the cached value for `key`, or `None`.
    ///
    /// Expired entries are deleted on the way out. Storage, decryption and
    /// decoding failures are logged and reported as a miss.
    pub async fn read<T>(&self, key: &CacheKey, owner_id: &str) -> Option<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.is_disabled() {
            self.stats.write().await.record_miss();
            return None;
        }

        let partition = key.partition();
        let entry = match self.store.get(partition, key.as_str()).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss: {}", key);
                self.stats.write().await.record_miss();
                return None;
            }
            Err(e) => {
                self.absorb("read", key.as_str(), &e);
                self.stats.write().await.record_miss();
                return None;
            }
        };

        let now = Utc::now();
        if entry.is_expired_at(now) {
            if let Err(e) = self.delete_if_expired(partition, key.as_str(), now).await {
                self.absorb("purge", key.as_str(), &e);
            }
            debug!("Cache entry expired: {}", key);
            let mut stats = self.stats.write().await;
            stats.record_expired(1);
            stats.record_miss();
            return None;
        }

        let remaining_ms = entry.ttl_remaining_ms();
        match self.decrypt_blocking::<T>(entry.blob, owner_id).await {
            Ok(value) => {
                debug!("Cache hit: {} ({} ms left)", key, remaining_ms);
                self.stats.write().await.record_hit();
                Some(value)
            }
            Err(e) => {
                self.absorb("decrypt", key.as_str(), &e);
                self.stats.write().await.record_decrypt_failure();
                None
            }
        }
    }

    // == Write ==
    /// Encrypts and stores `value` under `key` with the default TTL.
    ///
    /// Returns `Ok(true)` when stored and `Ok(false)` when caching is
    /// unsupported on this host.
    pub async fn write<T>(&self, key: &CacheKey, value: &T, owner_id: &str) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        self.write_with_ttl(key, value, owner_id, self.default_ttl)
            .await
    }

    /// Encrypts and stores `value` under `key`, expiring `ttl` from now.
    ///
    /// An existing entry is replaced wholesale.
    pub async fn write_with_ttl<T>(
        &self,
        key: &CacheKey,
        value: &T,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        if self.is_disabled() {
            self.stats.write().await.record_skipped_write();
            return Ok(false);
        }

        let plaintext = match serde_json::to_vec(value) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) => {
                let err = CacheError::EncryptionFailed(format!("serializing value: {e}"));
                warn!("Cache write failed for {}: {}", key, err);
                return Err(err);
            }
        };

        let result = match self.seal_blocking(plaintext, owner_id).await {
            Ok(blob) => {
                self.store
                    .put(key.partition(), key.as_str(), StoredEntry::new(blob, ttl))
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.stats.write().await.record_write();
                self.updates.publish(key.as_str(), UpdateKind::Written);
                debug!("Cached {} for {:?}", key, ttl);
                Ok(true)
            }
            Err(e) if e.degrades_to_miss() => {
                self.absorb("write", key.as_str(), &e);
                self.stats.write().await.record_skipped_write();
                Ok(false)
            }
            Err(e) => {
                warn!("Cache write failed for {}: {}", key, e);
                Err(e)
            }
        }
    }

    // == Invalidate ==
    /// Removes the entry for `key`. Removing an absent key succeeds.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        match self.store.delete(key.partition(), key.as_str()).await {
            Ok(()) => {
                self.updates.publish(key.as_str(), UpdateKind::Invalidated);
                Ok(())
            }
            Err(e) if e.degrades_to_miss() => {
                self.absorb("invalidate", key.as_str(), &e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Removes every entry of `owner_id` in `namespace`, e.g. on sign-out.
    ///
    /// Returns the number of entries removed.
    pub async fn invalidate_prefix(&self, owner_id: &str, namespace: &str) -> Result<usize> {
        let partition = Partition::for_namespace(namespace);
        let entries = match self.store.list_all(partition).await {
            Ok(entries) => entries,
            Err(e) if e.degrades_to_miss() => {
                self.absorb("invalidate prefix", namespace, &e);
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for (key, _) in entries
            .into_iter()
            .filter(|(key, _)| owned_by(key, namespace, owner_id))
        {
            self.store.delete(partition, &key).await?;
            self.updates.publish(&key, UpdateKind::Invalidated);
            removed += 1;
        }

        debug!(
            "Invalidated {} {} entries for owner {}",
            removed, namespace, owner_id
        );
        Ok(removed)
    }

    // == Sweep Expired ==
    /// Deletes expired entries across all partitions.
    ///
    /// Unreadable records left in the store are purged along the way. Returns
    /// the number of expired entries removed. Failures are logged and skipped.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        let mut purged = 0;

        for partition in Partition::ALL {
            match self.store.purge_unreadable(partition).await {
                Ok(count) => purged += count,
                Err(e) => self.absorb("purge", partition.name(), &e),
            }

            let entries = match self.store.list_all(partition).await {
                Ok(entries) => entries,
                Err(e) => {
                    self.absorb("sweep", partition.name(), &e);
                    continue;
                }
            };

            for (key, entry) in entries {
                if !entry.is_expired_at(now) {
                    continue;
                }
                match self.delete_if_expired(partition, &key, now).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => self.absorb("sweep", &key, &e),
                }
            }
        }

        if purged > 0 {
            info!("Cache sweep: removed {} unreadable records", purged);
        }
        if removed > 0 {
            self.stats.write().await.record_expired(removed as u64);
            info!("Cache sweep: removed {} expired entries", removed);
        } else {
            debug!("Cache sweep: no expired entries found");
        }

        removed
    }

    // == Clear All ==
    /// Empties every partition.
    pub async fn clear_all(&self) -> Result<()> {
        for partition in Partition::ALL {
            match self.store.clear(partition).await {
                Ok(()) => {}
                Err(e) if e.degrades_to_miss() => {
                    self.absorb("clear", partition.name(), &e);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        info!("Cache cleared");
        Ok(())
    }

    // == Read Through ==
    /// Returns the cached value or fetches it from the authoritative source.
    ///
    /// A fetched value is written back; a failed write-back is logged and
    /// never hides the fetched value. Fetch errors are returned unchanged.
    pub async fn read_through<T, F, Fut, E>(
        &self,
        key: &CacheKey,
        owner_id: &str,
        fetch: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.read(key, owner_id).await {
            return Ok(cached);
        }

        let fresh = fetch().await?;
        if let Err(e) = self.write(key, &fresh, owner_id).await {
            warn!("Could not cache fetched value for {}: {}", key, e);
        }
        Ok(fresh)
    }

    // == Internals ==
    /// Deletes `key` only if the stored entry is still expired at `now`.
    ///
    /// A write that replaced the entry after the caller looked at it is kept.
    /// One landing between this re-check and the delete is still lost, which
    /// costs a miss.
    async fn delete_if_expired(
        &self,
        partition: Partition,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self.store.get(partition, key).await? {
            Some(entry) if entry.is_expired_at(now) => {
                self.store.delete(partition, key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn seal_blocking(&self, plaintext: Zeroizing<Vec<u8>>, owner_id: &str) -> Result<String> {
        let cipher = self.cipher.clone();
        let owner_id = owner_id.to_string();

        task::spawn_blocking(move || cipher.seal(&plaintext, &owner_id))
            .await
            .map_err(|e| CacheError::EncryptionFailed(format!("encryption task: {e}")))?
    }

    async fn decrypt_blocking<T>(&self, blob: String, owner_id: &str) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let cipher = self.cipher.clone();
        let owner_id = owner_id.to_string();

        task::spawn_blocking(move || cipher.decrypt::<T>(&blob, &owner_id))
            .await
            .map_err(|e| CacheError::DecryptionFailed(format!("decryption task: {e}")))?
    }

    /// Logs a swallowed error and disables the cache if crypto is missing.
    fn absorb(&self, operation: &str, target: &str, err: &CacheError) {
        match err {
            CacheError::CryptoUnsupported(_) => {
                if !self.crypto_disabled.swap(true, Ordering::AcqRel) {
                    warn!("Disabling encrypted cache: {}", err);
                }
            }
            CacheError::StorageUnavailable(_) => {
                debug!("Cache {} skipped for {}: {}", operation, target, err);
            }
            CacheError::DecryptionFailed(_) | CacheError::InvalidOwner => {
                debug!("Cache {} failed for {}: {}", operation, target, err);
            }
            _ => {
                warn!("Cache {} failed for {}: {}", operation, target, err);
            }
        }
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("default_ttl", &self.default_ttl)
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}
