//! Key Derivation Module
//!
//! Turns an owner identifier plus a random salt into an AES-256 key.
//!
//! The owner id is treated as password-equivalent key material and stretched
//! with PBKDF2-HMAC-SHA256. The same `(owner_id, salt)` pair always yields the
//! same key; a fresh salt yields an unrelated one.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::NONCE_LEN;
use crate::error::{CacheError, Result};

// == Wire Format Constants ==
/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count. Changing it invalidates every stored blob.
pub const KDF_ITERATIONS: u32 = 100_000;

// == Symmetric Key ==
/// A derived AES-256-GCM key.
///
/// The raw key bytes are not retained or exposed; the key can only seal and
/// open payloads.
pub struct SymmetricKey {
    cipher: Aes256Gcm,
}

impl SymmetricKey {
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(bytes)
            .map_err(|e| CacheError::CryptoUnsupported(format!("AES-256-GCM key setup: {e}")))?;
        Ok(Self { cipher })
    }

    /// Encrypts `plaintext`, returning ciphertext with the 16-byte tag appended.
    pub(crate) fn seal(
        &self,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> std::result::Result<Vec<u8>, aes_gcm::Error> {
        self.cipher.encrypt(Nonce::from_slice(nonce), plaintext)
    }

    /// Verifies the tag and decrypts.
    pub(crate) fn open(
        &self,
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
    ) -> std::result::Result<Vec<u8>, aes_gcm::Error> {
        self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext)
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

// == Key Deriver ==
/// Derives encryption keys from an owner identity.
///
/// Implementations must fail with [`CacheError::CryptoUnsupported`] when the
/// underlying primitive is unavailable rather than substitute a weaker one.
pub trait KeyDeriver: Send + Sync {
    fn derive(&self, owner_id: &str, salt: &[u8; SALT_LEN]) -> Result<SymmetricKey>;
}

/// PBKDF2-HMAC-SHA256 key derivation.
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2Sha256 {
    iterations: u32,
}

impl Pbkdf2Sha256 {
    pub fn new() -> Self {
        Self {
            iterations: KDF_ITERATIONS,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for Pbkdf2Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDeriver for Pbkdf2Sha256 {
    fn derive(&self, owner_id: &str, salt: &[u8; SALT_LEN]) -> Result<SymmetricKey> {
        if owner_id.is_empty() {
            return Err(CacheError::InvalidOwner);
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(owner_id.as_bytes(), salt, self.iterations, &mut key[..]);
        SymmetricKey::from_bytes(&key[..])
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const NONCE: [u8; NONCE_LEN] = [7u8; NONCE_LEN];

    fn seal_sample(key: &SymmetricKey) -> Vec<u8> {
        key.seal(&NONCE, b"sample").unwrap()
    }

    #[test]
    fn test_default_iterations() {
        assert_eq!(Pbkdf2Sha256::default().iterations(), 100_000);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let kdf = Pbkdf2Sha256::new();
        let salt = [1u8; SALT_LEN];

        let first = kdf.derive("user-1", &salt).unwrap();
        let second = kdf.derive("user-1", &salt).unwrap();

        // Same key => same ciphertext under a fixed nonce
        assert_eq!(seal_sample(&first), seal_sample(&second));
    }

    #[test]
    fn test_different_salt_gives_different_key() {
        let kdf = Pbkdf2Sha256::new();

        let a = kdf.derive("user-1", &[1u8; SALT_LEN]).unwrap();
        let b = kdf.derive("user-1", &[2u8; SALT_LEN]).unwrap();

        assert_ne!(seal_sample(&a), seal_sample(&b));
    }

    #[test]
    fn test_different_owner_gives_different_key() {
        let kdf = Pbkdf2Sha256::new();
        let salt = [3u8; SALT_LEN];

        let a = kdf.derive("user-a", &salt).unwrap();
        let b = kdf.derive("user-b", &salt).unwrap();

        let sealed = seal_sample(&a);
        assert!(b.open(&NONCE, &sealed).is_err());
        assert_eq!(a.open(&NONCE, &sealed).unwrap(), b"sample");
    }

    #[test]
    fn test_empty_owner_rejected() {
        let result = Pbkdf2Sha256::new().derive("", &[0u8; SALT_LEN]);
        assert!(matches!(result, Err(CacheError::InvalidOwner)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = Pbkdf2Sha256::new().derive("user-1", &[0u8; SALT_LEN]).unwrap();
        assert_eq!(format!("{key:?}"), "SymmetricKey(<redacted>)");
    }
}
