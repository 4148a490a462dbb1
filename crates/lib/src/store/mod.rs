//! Record storage: the record model, the encrypted blob layer, per-user
//! partitions and archive transfer.
//!
//! ```text
//! RecordStore (user, partition) ── RecordMap (CRUD + last-write-wins)
//!        │
//! EncryptedBlobStore (AES-256-GCM, one blob per user+partition)
//!        │
//! KvBackend
//! ```

mod errors;
pub use errors::StoreError;

mod encrypted;
pub use encrypted::{
    EncryptedBlobStore, EncryptionKey, KEY_LENGTH, MIN_SALT_LENGTH, NONCE_LENGTH, TAG_LENGTH,
};

mod record;
pub use record::{MAX_JOB_DESCRIPTION_CHARS, Partition, Record, RecordInput, Status};

mod record_map;
pub use record_map::RecordMap;

mod record_store;
pub use record_store::{RecordStore, blob_key};

pub mod archive;
pub use archive::PartitionStore;
