//! Authenticated encryption over a [`KvBackend`].
//!
//! Data flows as:
//!
//! ```text
//! put: value → JSON → AES-256-GCM(fresh nonce) → base64(nonce ‖ ciphertext ‖ tag) → backend
//! get: backend → base64 decode → split nonce → decrypt + authenticate → JSON → value
//! ```
//!
//! A missing key reads as `None`. Anything stored that fails to decode or
//! authenticate is a [`StoreError::Decryption`]; plaintext that authenticates
//! but does not match the expected type is a [`StoreError::Corrupted`].

use std::{fmt, sync::Arc};

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, AeadCore, OsRng},
};
use argon2::Argon2;
use base64ct::{Base64, Encoding};
use serde::{Serialize, de::DeserializeOwned};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::errors::StoreError;
use crate::{Result, backend::KvBackend};

/// Nonce length for AES-GCM (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// Key length for AES-256.
pub const KEY_LENGTH: usize = 32;

/// Authentication tag appended by AES-GCM.
pub const TAG_LENGTH: usize = 16;

/// Minimum salt length accepted by Argon2.
pub const MIN_SALT_LENGTH: usize = 8;

/// Store-wide symmetric key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LENGTH]);

impl EncryptionKey {
    /// Derive a key from the configured secret using Argon2id.
    ///
    /// Derivation is deterministic: the same `secret` and `salt` always yield
    /// the same key, so blobs written by one process decrypt in the next.
    pub fn derive(secret: impl AsRef<str>, salt: impl AsRef<str>) -> Result<Self> {
        let secret = secret.as_ref();
        let salt = salt.as_ref();
        if secret.is_empty() {
            return Err(StoreError::InvalidKey {
                reason: "encryption secret is empty".to_string(),
            }
            .into());
        }
        if salt.len() < MIN_SALT_LENGTH {
            return Err(StoreError::InvalidKey {
                reason: format!(
                    "salt must be at least {MIN_SALT_LENGTH} bytes, got {}",
                    salt.len()
                ),
            }
            .into());
        }

        let mut key = [0u8; KEY_LENGTH];
        Argon2::default()
            .hash_password_into(secret.as_bytes(), salt.as_bytes(), &mut key)
            .map_err(|e| StoreError::InvalidKey {
                reason: format!("key derivation failed: {e}"),
            })?;
        Ok(Self(key))
    }

    /// Use raw key bytes directly.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0).map_err(|e| {
            StoreError::InvalidKey {
                reason: format!("failed to create cipher: {e}"),
            }
            .into()
        })
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Typed `put`/`get` over a backend, with every stored value encrypted.
#[derive(Clone)]
pub struct EncryptedBlobStore {
    backend: Arc<dyn KvBackend>,
    key: Arc<EncryptionKey>,
}

impl EncryptedBlobStore {
    pub fn new(backend: Arc<dyn KvBackend>, key: EncryptionKey) -> Self {
        Self {
            backend,
            key: Arc::new(key),
        }
    }

    /// The underlying medium.
    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    /// Serialize, encrypt and store `value` under `key`.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let plaintext = serde_json::to_vec(value).map_err(|e| StoreError::Encryption {
            reason: format!("serializing value failed: {e}"),
        })?;
        let sealed = self.seal(&plaintext)?;
        self.backend.put(key, sealed).await
    }

    /// Read, decrypt and decode the value under `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(sealed) = self.backend.get(key).await? else {
            return Ok(None);
        };
        let plaintext = self.open(key, &sealed)?;
        let value = serde_json::from_slice(&plaintext).map_err(|e| StoreError::Corrupted {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    /// Encrypt `plaintext` under a fresh random nonce and encode it for storage.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext =
            self.key
                .cipher()?
                .encrypt(&nonce, plaintext)
                .map_err(|e| StoreError::Encryption {
                    reason: e.to_string(),
                })?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(nonce.as_slice());
        combined.extend_from_slice(&ciphertext);
        Ok(Base64::encode_string(&combined))
    }

    /// Decode and authenticate a sealed value. `key` is only used for error context.
    pub fn open(&self, key: &str, sealed: &str) -> Result<Vec<u8>> {
        let decryption = |reason: String| StoreError::Decryption {
            key: key.to_string(),
            reason,
        };

        let combined =
            Base64::decode_vec(sealed).map_err(|_| decryption("invalid base64".to_string()))?;
        if combined.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(decryption(format!(
                "blob too short: {} bytes",
                combined.len()
            ))
            .into());
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LENGTH);
        let plaintext = self
            .key
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| decryption("authentication failed".to_string()))?;
        Ok(plaintext)
    }
}

impl fmt::Debug for EncryptedBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedBlobStore").finish_non_exhaustive()
    }
}
