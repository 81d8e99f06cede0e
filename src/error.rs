//! Error types for the encrypted cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the encrypted cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Host lacks a required cryptographic primitive
    #[error("Crypto unsupported: {0}")]
    CryptoUnsupported(String),

    /// Serialization or sealing of a value failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Malformed blob, failed tag check, wrong owner, or undecodable payload
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// No durable storage medium is available
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// I/O failure on an otherwise available medium
    #[error("Storage error: {0}")]
    Storage(String),

    /// Cache key does not follow the `<namespace>:<id>` convention
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Owner identifier is empty
    #[error("Owner id must not be empty")]
    InvalidOwner,
}

impl CacheError {
    /// Builds a `Storage` error carrying the operation context.
    pub fn storage(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        CacheError::Storage(format!("{context}: {err}"))
    }

    /// Returns true for failures that disable caching instead of failing the caller.
    ///
    /// These errors mean the cache cannot work at all on this host, so writes
    /// become no-ops and reads become misses.
    pub fn degrades_to_miss(&self) -> bool {
        matches!(
            self,
            CacheError::CryptoUnsupported(_) | CacheError::StorageUnavailable(_)
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the encrypted cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrades_to_miss() {
        assert!(CacheError::CryptoUnsupported("no aes".into()).degrades_to_miss());
        assert!(CacheError::StorageUnavailable("read-only".into()).degrades_to_miss());
        assert!(!CacheError::DecryptionFailed("tag".into()).degrades_to_miss());
        assert!(!CacheError::Storage("disk full".into()).degrades_to_miss());
        assert!(!CacheError::InvalidOwner.degrades_to_miss());
    }

    #[test]
    fn test_storage_context_message() {
        let err = CacheError::storage("writing entry", "permission denied");
        assert_eq!(
            err.to_string(),
            "Storage error: writing entry: permission denied"
        );
    }
}
