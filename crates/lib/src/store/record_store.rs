//! Encrypted, per-user, per-partition record collection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    archive::PartitionStore,
    encrypted::EncryptedBlobStore,
    record::{Partition, Record, RecordInput},
    record_map::RecordMap,
};
use crate::{Clock, Result};

/// Storage key of a user's blob for one partition.
pub fn blob_key(partition: Partition, user: &str) -> String {
    format!("{}:{user}", partition.as_str())
}

/// CRUD over one user's partition, persisted as a single encrypted blob.
///
/// Every mutation reads the whole mapping, changes it and writes it back. No
/// lock is held between the read and the write: two overlapping requests for
/// the same user and partition race, and the later write wins.
#[derive(Clone, Debug)]
pub struct RecordStore {
    blobs: EncryptedBlobStore,
    user: String,
    partition: Partition,
    clock: Arc<dyn Clock>,
}

impl RecordStore {
    pub fn new(
        blobs: EncryptedBlobStore,
        user: impl Into<String>,
        partition: Partition,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            blobs,
            user: user.into(),
            partition,
            clock,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    fn key(&self) -> String {
        blob_key(self.partition, &self.user)
    }

    /// The full mapping. A user with no blob yet gets an empty mapping, which
    /// is persisted immediately so later reads see an initialized store.
    pub async fn list(&self) -> Result<RecordMap> {
        let key = self.key();
        match self.blobs.get::<RecordMap>(&key).await? {
            Some(map) => {
                map.check_integrity(&key)?;
                Ok(map)
            }
            None => {
                debug!(user = %self.user, partition = %self.partition, "initializing empty record store");
                let map = RecordMap::new();
                self.blobs.put(&key, &map).await?;
                Ok(map)
            }
        }
    }

    /// The user's other partition, read without initializing it.
    async fn sibling(&self) -> Result<RecordMap> {
        let key = blob_key(self.partition.sibling(), &self.user);
        match self.blobs.get::<RecordMap>(&key).await? {
            Some(map) => {
                map.check_integrity(&key)?;
                Ok(map)
            }
            None => Ok(RecordMap::new()),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.list().await?.get(id).cloned())
    }

    pub async fn create(&self, input: RecordInput) -> Result<Record> {
        let mut map = self.list().await?;
        let other = self.sibling().await?;
        let record = map.create_excluding(input, self.clock.now_utc(), &other)?;
        self.save(&map).await?;
        debug!(user = %self.user, partition = %self.partition, id = %record.id, "created record");
        Ok(record)
    }

    pub async fn update(&self, id: &str, input: RecordInput) -> Result<Record> {
        let mut map = self.list().await?;
        let record = map.update(id, input, self.clock.now_utc())?;
        self.save(&map).await?;
        debug!(user = %self.user, partition = %self.partition, id, "updated record");
        Ok(record)
    }

    pub async fn delete(&self, id: &str) -> Result<usize> {
        self.delete_many(&[id]).await
    }

    /// Remove the listed ids. Absent ids are skipped; returns the count removed.
    pub async fn delete_many<S: AsRef<str> + Sync>(&self, ids: &[S]) -> Result<usize> {
        let mut map = self.list().await?;
        let removed = map.remove_many(ids);
        self.save(&map).await?;
        info!(user = %self.user, partition = %self.partition, removed, "deleted records");
        Ok(removed)
    }

    /// Last-write-wins merge of full records; see
    /// [`RecordMap::upsert_newer_excluding`]. Records already held by the
    /// user's other partition are skipped.
    pub async fn bulk_upsert(&self, records: Vec<Record>) -> Result<usize> {
        let received = records.len();
        let mut map = self.list().await?;
        let other = self.sibling().await?;
        let applied = map.upsert_newer_excluding(records, &other)?;
        self.save(&map).await?;
        info!(user = %self.user, partition = %self.partition, received, applied, "bulk upsert");
        Ok(applied)
    }

    /// Distinct tags used in this partition.
    pub async fn tags(&self) -> Result<Vec<String>> {
        Ok(self.list().await?.tags())
    }

    async fn save(&self, map: &RecordMap) -> Result<()> {
        self.blobs.put(&self.key(), map).await
    }
}

#[async_trait]
impl PartitionStore for RecordStore {
    async fn load(&self) -> Result<RecordMap> {
        self.list().await
    }

    async fn store(&self, map: &RecordMap) -> Result<()> {
        self.save(map).await
    }
}
