//! Crypto Module
//!
//! Owner-bound key derivation and authenticated encryption of cached values.

mod cipher;
mod kdf;

pub use cipher::{AuthenticatedCipher, FORMAT_VERSION, NONCE_LEN, TAG_LEN};
pub use kdf::{KeyDeriver, Pbkdf2Sha256, SymmetricKey, KDF_ITERATIONS, KEY_LEN, SALT_LEN};
