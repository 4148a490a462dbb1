//! The uniform CRUD surface every replica presents.

use async_trait::async_trait;

use crate::{
    Result,
    store::{Partition, Record, RecordInput, RecordMap},
};

/// Record operations over one user's partitions.
///
/// Implemented by the device-local [`LocalReplica`](crate::replica::LocalReplica),
/// the in-process [`SessionHandle`](crate::service::SessionHandle) and the HTTP
/// [`RemoteClient`](super::RemoteClient), so the [`Synchronizer`](super::Synchronizer)
/// can route between them without knowing which is which.
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// The full `id → Record` mapping of `partition`.
    async fn list(&self, partition: Partition) -> Result<RecordMap>;

    async fn create(&self, partition: Partition, input: RecordInput) -> Result<Record>;

    async fn update(&self, partition: Partition, id: &str, input: RecordInput) -> Result<Record>;

    /// Delete the listed ids; returns how many were present.
    async fn delete(&self, partition: Partition, ids: &[String]) -> Result<usize>;

    /// Move the listed ids from active to archive; returns how many moved.
    async fn archive(&self, ids: &[String]) -> Result<usize>;

    /// Last-write-wins merge of full records; returns how many were applied.
    async fn bulk_import(&self, partition: Partition, records: Vec<Record>) -> Result<usize>;

    /// Distinct tags in `partition`, sorted.
    async fn tags(&self, partition: Partition) -> Result<Vec<String>>;
}
