//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.
//! Reads already purge expired entries on access; the sweep reclaims space
//! held by entries nobody reads again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheManager;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// The first sweep runs after one interval has elapsed. Sweep failures are
/// absorbed by the manager, so the task only ends when aborted.
///
/// # Example
/// ```ignore
/// let manager = Arc::new(CacheManager::from_config(&config));
/// let sweep_handle = spawn_sweep_task(manager.clone(), Duration::from_secs(3600));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(manager: Arc<CacheManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;
            manager.sweep_expired().await;
        }
    })
}
