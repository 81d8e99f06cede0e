//! Cache Entry Module
//!
//! Defines the persisted record for a single encrypted cache entry.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// == Stored Entry ==
/// A sealed value with its lifetime metadata.
///
/// Only the encrypted blob is stored; there is no plaintext copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Encoded blob produced by the cipher
    pub blob: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// When the entry stops being readable
    pub expires_at: DateTime<Utc>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl` after now.
    ///
    /// A TTL too large to represent saturates to the far future.
    pub fn new(blob: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            blob,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to `expires_at`, so a zero TTL is never readable.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Checks expiry against a fixed instant, so sweeps use one clock reading.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        (self.expires_at - Utc::now()).num_milliseconds().max(0) as u64
    }
}
