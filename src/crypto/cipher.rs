//! Authenticated Cipher Module
//!
//! Seals values into self-contained printable blobs and opens them again.
//!
//! # Blob Layout
//! ```text
//! base64( version[1] || salt[16] || nonce[12] || ciphertext || tag[16] )
//! ```
//! Decryption needs only the blob and the owner id. Every call draws a fresh
//! salt and nonce, so each blob is sealed under its own key.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::crypto::{KeyDeriver, Pbkdf2Sha256, SALT_LEN};
use crate::error::{CacheError, Result};

// == Wire Format Constants ==
/// Current blob format version.
pub const FORMAT_VERSION: u8 = 1;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

const HEADER_LEN: usize = 1 + SALT_LEN + NONCE_LEN;

// == Authenticated Cipher ==
/// Stateless AES-256-GCM sealer keyed per call from the owner identity.
#[derive(Clone)]
pub struct AuthenticatedCipher {
    kdf: Arc<dyn KeyDeriver>,
}

impl AuthenticatedCipher {
    /// Creates a cipher using PBKDF2-HMAC-SHA256 key derivation.
    pub fn new() -> Self {
        Self::with_kdf(Arc::new(Pbkdf2Sha256::new()))
    }

    /// Creates a cipher over a custom key deriver.
    pub fn with_kdf(kdf: Arc<dyn KeyDeriver>) -> Self {
        Self { kdf }
    }

    // == Encrypt ==
    /// Serializes `value` as JSON and seals it for `owner_id`.
    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T, owner_id: &str) -> Result<String> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(value)
                .map_err(|e| CacheError::EncryptionFailed(format!("serializing value: {e}")))?,
        );
        self.seal(&plaintext, owner_id)
    }

    // == Decrypt ==
    /// Opens a blob sealed for `owner_id` and deserializes the JSON payload.
    pub fn decrypt<T: DeserializeOwned>(&self, blob: &str, owner_id: &str) -> Result<T> {
        let plaintext = self.open(blob, owner_id)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| CacheError::DecryptionFailed(format!("deserializing payload: {e}")))
    }

    // == Seal ==
    /// Seals raw bytes into an encoded blob.
    pub fn seal(&self, plaintext: &[u8], owner_id: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .and_then(|_| OsRng.try_fill_bytes(&mut nonce))
            .map_err(|e| CacheError::CryptoUnsupported(format!("random source: {e}")))?;

        let key = self.kdf.derive(owner_id, &salt)?;
        let ciphertext = key
            .seal(&nonce, plaintext)
            .map_err(|e| CacheError::EncryptionFailed(format!("AES-GCM seal: {e}")))?;

        let mut raw = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        raw.push(FORMAT_VERSION);
        raw.extend_from_slice(&salt);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(raw))
    }

    // == Open ==
    /// Decodes and authenticates a blob, returning the raw plaintext.
    ///
    /// Owner and primitive errors from key derivation pass through unchanged;
    /// every problem with the blob itself is a `DecryptionFailed`.
    pub fn open(&self, blob: &str, owner_id: &str) -> Result<Zeroizing<Vec<u8>>> {
        let raw = STANDARD
            .decode(blob.trim())
            .map_err(|e| CacheError::DecryptionFailed(format!("invalid base64: {e}")))?;

        if raw.len() < HEADER_LEN + TAG_LEN {
            return Err(CacheError::DecryptionFailed(format!(
                "blob too short: {} bytes",
                raw.len()
            )));
        }

        let (version, rest) = raw.split_at(1);
        if version[0] != FORMAT_VERSION {
            return Err(CacheError::DecryptionFailed(format!(
                "unsupported blob version {}",
                version[0]
            )));
        }

        let (salt, rest) = rest.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let salt: &[u8; SALT_LEN] = salt
            .try_into()
            .map_err(|_| CacheError::DecryptionFailed("malformed salt".into()))?;
        let nonce: &[u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CacheError::DecryptionFailed("malformed nonce".into()))?;

        let key = self.kdf.derive(owner_id, salt)?;
        key.open(nonce, ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| CacheError::DecryptionFailed("authentication tag mismatch".into()))
    }
}

impl Default for AuthenticatedCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthenticatedCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedCipher").finish_non_exhaustive()
    }
}
