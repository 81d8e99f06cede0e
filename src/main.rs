//! Sealed Cache sweeper
//!
//! Keeps an on-disk encrypted cache tidy by removing expired entries.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sealed_cache::{spawn_sweep_task, CacheManager, Config};

/// Entry point for the cache sweeper.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache manager over the configured directory
/// 4. Run one sweep immediately
/// 5. Start the periodic sweep task
/// 6. Stop on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealed_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sealed Cache sweeper");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_dir={}, default_ttl={}s, sweep_interval={}s",
        config.cache_dir.display(),
        config.default_ttl,
        config.sweep_interval
    );

    let manager = Arc::new(CacheManager::from_config(&config));

    let removed = manager.sweep_expired().await;
    info!("Startup sweep removed {} expired entries", removed);

    let sweep_handle = spawn_sweep_task(manager.clone(), config.sweep_interval());
    info!("Background sweep task started");

    shutdown_signal().await?;

    sweep_handle.abort();
    warn!("Sweep task aborted");

    let stats = manager.stats().await;
    info!("Sweeper shutdown complete, {} entries expired in total", stats.expired);
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
