//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default entry lifetime: 7 days.
pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Default interval between background sweeps: 1 hour.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one subdirectory per partition
    pub cache_dir: PathBuf,
    /// Default TTL in seconds for entries written without an explicit TTL
    pub default_ttl: u64,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Root cache directory (default: platform cache dir + `sealed-cache`)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 604800)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 3600)
    pub fn from_env() -> Self {
        Self {
            cache_dir: env::var_os("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_dir),
            default_ttl: env::var("CACHE_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TTL_SECS),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    /// Default TTL as a `Duration`.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            default_ttl: DEFAULT_TTL_SECS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("sealed-cache"))
        .unwrap_or_else(|| PathBuf::from(".sealed-cache"))
}
