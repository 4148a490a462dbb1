//!
//! jobvault: a replicated, encrypted job-application record store.
//!
//! ## Core Concepts
//!
//! * **Records (`store::Record`)**: one job application. Stored per user in two
//!   partitions, *active* and *archive*, each a single `id → Record` mapping.
//! * **Backends (`backend::KvBackend`)**: the opaque key → text medium under
//!   every persisted value.
//! * **Encrypted Blob Store (`store::EncryptedBlobStore`)**: AES-256-GCM over a
//!   backend, with a fresh nonce per write.
//! * **Record Store (`store::RecordStore`)**: CRUD and last-write-wins merge over
//!   one user's partition, plus archive transfer between the two partitions.
//! * **Sessions (`auth::SessionManager`)**: opaque session ids minted from a
//!   verified identity assertion, with sliding expiry.
//! * **Service (`service::RecordService`)** and **API (`api::router`)**: the
//!   session-gated server boundary and its HTTP routes.
//! * **Local Replica (`replica::LocalReplica`)**: plaintext device-local copy used
//!   while signed out.
//! * **Synchronizer (`sync::Synchronizer`)**: routes each client call to the
//!   local or remote replica, and imports local records on sign-in.

pub mod api;
pub mod auth;
pub mod backend;
pub mod clock;
pub mod config;
pub mod constants;
pub mod replica;
pub mod service;
pub mod store;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};

/// Result type used throughout the jobvault library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the jobvault library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Rejected configuration values
    #[error(transparent)]
    Config(config::ConfigError),

    /// Structured errors from the storage media
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured errors from record stores and blob encryption
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured authentication errors from the auth module
    #[error(transparent)]
    Auth(auth::AuthError),

    /// Structured errors from routing and the remote client
    #[error(transparent)]
    Sync(sync::SyncError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::Config(_) => "config",
            Error::Backend(_) => "backend",
            Error::Store(_) => "store",
            Error::Auth(_) => "auth",
            Error::Sync(_) => "sync",
        }
    }

    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is an input validation failure.
    pub fn is_validation_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_validation_error(),
            _ => false,
        }
    }

    /// Check if this error is authentication-related.
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// Check if stored data decrypted but failed schema validation.
    pub fn is_corrupted(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_corrupted(),
            _ => false,
        }
    }

    /// Check if a stored blob failed to decode or authenticate.
    pub fn is_decryption_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_decryption_error(),
            _ => false,
        }
    }

    /// Check if this error comes from the encryption layer.
    pub fn is_crypto_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_crypto_error(),
            _ => false,
        }
    }

    /// Check if an operation was refused because the client is offline.
    pub fn is_paused_offline(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_paused_offline(),
            _ => false,
        }
    }

    /// Check if this error is a network/connection failure.
    pub fn is_network_error(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_network_error(),
            _ => false,
        }
    }

    /// Check if this error is storage-medium related.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
            _ => false,
        }
    }

    /// Check if a configuration value was rejected.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
