//! Error types for record stores and the encrypted blob layer.

use thiserror::Error;

/// Errors raised by record stores (remote and local) and by blob encryption.
///
/// Corruption and decryption failures are distinct from
/// [`StoreError::RecordNotFound`]: callers treat them as server-side failures,
/// never as an empty result.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input failed validation; never retried automatically.
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// The referenced record id is absent from the partition.
    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    /// A stored value decoded (and, if encrypted, authenticated) but does not
    /// match the record schema.
    #[error("Stored data under '{key}' is corrupted: {reason}")]
    Corrupted { key: String, reason: String },

    /// A stored blob failed to decode or authenticate.
    #[error("Failed to decrypt blob '{key}': {reason}")]
    Decryption { key: String, reason: String },

    /// Encrypting a value failed.
    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },

    /// The configured secret could not be turned into an encryption key.
    #[error("Invalid encryption key: {reason}")]
    InvalidKey { reason: String },
}

impl StoreError {
    /// Shorthand for a validation failure on `field`.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::RecordNotFound { .. })
    }

    /// Check if this error is an input validation failure.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, StoreError::Validation { .. })
    }

    /// Check if stored data failed schema validation.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, StoreError::Corrupted { .. })
    }

    /// Check if a stored blob failed authentication or decoding.
    pub fn is_decryption_error(&self) -> bool {
        matches!(self, StoreError::Decryption { .. })
    }

    /// Check if this error comes from the encryption layer.
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            StoreError::Decryption { .. }
                | StoreError::Encryption { .. }
                | StoreError::InvalidKey { .. }
        )
    }

    /// Get the storage key involved, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreError::Corrupted { key, .. } | StoreError::Decryption { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
