//! Key-value storage media
//!
//! This module provides the [`KvBackend`] trait: the opaque key → text medium
//! underneath every persisted structure in jobvault. The server keeps encrypted
//! record blobs and plaintext session records in two backends; a client device
//! keeps its Local Replica in a third.
//!
//! [`InMemory`] holds everything in a map and persists only when saved to a
//! file. [`Sqlite`] (feature `sqlite`, on by default) commits every write.
//!
//! Backends offer no locking across calls. Every higher layer performs
//! read-modify-write of whole values, and two overlapping writers race with the
//! later `put` winning. [`KvBackend::put_if_present`] is the one conditional
//! write, used where a concurrent delete must win.

use async_trait::async_trait;

use crate::Result;

pub mod errors;
mod in_memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use errors::BackendError;
pub use in_memory::InMemory;
#[cfg(feature = "sqlite")]
pub use sqlite::Sqlite;

/// Storage medium mapping string keys to opaque string values.
///
/// All implementations must be `Send` and `Sync` to allow sharing across request
/// handlers.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Reads the value stored under `key`, or `None` if nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: String) -> Result<()>;

    /// Replaces the value under `key` only if one is currently stored, as a
    /// single step. Returns whether the value was written.
    async fn put_if_present(&self, key: &str, value: String) -> Result<bool>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists every key currently stored, in no particular order.
    async fn keys(&self) -> Result<Vec<String>>;
}
