//! Device-local replica of a user's records.
//!
//! Used when nobody is signed in. Each partition is a plaintext JSON object
//! under a fixed device-storage key ([`LOCAL_ACTIVE_KEY`], [`LOCAL_ARCHIVE_KEY`]).
//! The device is the trust boundary: no encryption, no session.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    Clock, Result,
    backend::KvBackend,
    constants::{LOCAL_ACTIVE_KEY, LOCAL_ARCHIVE_KEY},
    store::{
        Partition, PartitionStore, Record, RecordInput, RecordMap, StoreError,
        archive::{self, dedup_after_interrupted_transfer},
    },
    sync::RecordApi,
};

/// Device-storage key of a partition.
pub fn local_key(partition: Partition) -> &'static str {
    match partition {
        Partition::Active => LOCAL_ACTIVE_KEY,
        Partition::Archive => LOCAL_ARCHIVE_KEY,
    }
}

/// One partition of the replica, persisted as a whole.
struct LocalPartition<'a> {
    storage: &'a dyn KvBackend,
    key: &'static str,
}

#[async_trait]
impl PartitionStore for LocalPartition<'_> {
    async fn load(&self) -> Result<RecordMap> {
        let Some(raw) = self.storage.get(self.key).await? else {
            return Ok(RecordMap::new());
        };
        let map: RecordMap = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupted {
            key: self.key.to_string(),
            reason: e.to_string(),
        })?;
        map.check_integrity(self.key)?;
        Ok(map)
    }

    async fn store(&self, map: &RecordMap) -> Result<()> {
        self.storage.put(self.key, serde_json::to_string(map)?).await
    }
}

/// The Local Replica: the same CRUD surface as the remote store, over device
/// storage.
#[derive(Clone)]
pub struct LocalReplica {
    storage: Arc<dyn KvBackend>,
    clock: Arc<dyn Clock>,
}

impl LocalReplica {
    pub fn new(storage: Arc<dyn KvBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// The underlying device storage.
    pub fn storage(&self) -> &Arc<dyn KvBackend> {
        &self.storage
    }

    fn partition(&self, partition: Partition) -> LocalPartition<'_> {
        LocalPartition {
            storage: self.storage.as_ref(),
            key: local_key(partition),
        }
    }

    /// Remove active records that also exist in the archive.
    pub async fn repair(&self) -> Result<usize> {
        dedup_after_interrupted_transfer(
            &self.partition(Partition::Active),
            &self.partition(Partition::Archive),
        )
        .await
    }

    /// Forget every local record in both partitions.
    pub async fn clear(&self) -> Result<()> {
        for partition in [Partition::Active, Partition::Archive] {
            self.storage.delete(local_key(partition)).await?;
        }
        info!("cleared local replica");
        Ok(())
    }
}

impl std::fmt::Debug for LocalReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalReplica")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordApi for LocalReplica {
    async fn list(&self, partition: Partition) -> Result<RecordMap> {
        self.partition(partition).load().await
    }

    async fn create(&self, partition: Partition, input: RecordInput) -> Result<Record> {
        let store = self.partition(partition);
        let mut map = store.load().await?;
        let other = self.partition(partition.sibling()).load().await?;
        let record = map.create_excluding(input, self.clock.now_utc(), &other)?;
        store.store(&map).await?;
        debug!(%partition, id = %record.id, "created local record");
        Ok(record)
    }

    async fn update(&self, partition: Partition, id: &str, input: RecordInput) -> Result<Record> {
        let store = self.partition(partition);
        let mut map = store.load().await?;
        let record = map.update(id, input, self.clock.now_utc())?;
        store.store(&map).await?;
        debug!(%partition, id, "updated local record");
        Ok(record)
    }

    async fn delete(&self, partition: Partition, ids: &[String]) -> Result<usize> {
        let store = self.partition(partition);
        let mut map = store.load().await?;
        let removed = map.remove_many(ids);
        store.store(&map).await?;
        debug!(%partition, removed, "deleted local records");
        Ok(removed)
    }

    async fn archive(&self, ids: &[String]) -> Result<usize> {
        archive::transfer(
            &self.partition(Partition::Active),
            &self.partition(Partition::Archive),
            ids,
        )
        .await
    }

    async fn bulk_import(&self, partition: Partition, records: Vec<Record>) -> Result<usize> {
        let store = self.partition(partition);
        let mut map = store.load().await?;
        let other = self.partition(partition.sibling()).load().await?;
        let applied = map.upsert_newer_excluding(records, &other)?;
        store.store(&map).await?;
        debug!(%partition, applied, "merged into local replica");
        Ok(applied)
    }

    async fn tags(&self, partition: Partition) -> Result<Vec<String>> {
        Ok(self.partition(partition).load().await?.tags())
    }
}
