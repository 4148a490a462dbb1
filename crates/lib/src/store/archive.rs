//! Moving records from the active partition to the archive partition.
//!
//! The two partitions are persisted independently, so a transfer is two
//! writes. The destination is always written first: a failure between the
//! writes leaves the moved records present in both partitions (recoverable by
//! [`dedup_after_interrupted_transfer`]) rather than in neither.

use async_trait::async_trait;
use tracing::{info, warn};

use super::record_map::RecordMap;
use crate::Result;

/// A whole-mapping persisted partition (remote encrypted or local plaintext).
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Read the full mapping, initializing an empty one if absent.
    async fn load(&self) -> Result<RecordMap>;

    /// Replace the full mapping.
    async fn store(&self, map: &RecordMap) -> Result<()>;
}

/// Copy every listed id present in `active` into `archive` unchanged, then
/// remove them from `active`. Ids not found in `active` are skipped.
///
/// Returns the number of records moved.
pub async fn transfer<S: AsRef<str> + Sync>(
    active: &dyn PartitionStore,
    archive: &dyn PartitionStore,
    ids: &[S],
) -> Result<usize> {
    let mut source = active.load().await?;
    let moving = source.select(ids);
    if moving.is_empty() {
        return Ok(0);
    }
    let count = moving.len();
    let moved_ids: Vec<String> = moving.iter().map(|r| r.id.clone()).collect();

    let mut destination = archive.load().await?;
    destination.insert_unchanged(moving);
    archive.store(&destination).await?;

    source.remove_many(moved_ids.as_slice());
    if let Err(e) = active.store(&source).await {
        warn!(count, error = %e, "archived records were not removed from the active partition");
        return Err(e);
    }

    info!(count, "archived records");
    Ok(count)
}

/// Remove from `active` every record that is also present in `archive`,
/// completing transfers interrupted between their two writes.
///
/// Returns the number of duplicates removed.
pub async fn dedup_after_interrupted_transfer(
    active: &dyn PartitionStore,
    archive: &dyn PartitionStore,
) -> Result<usize> {
    let archived = archive.load().await?;
    let mut source = active.load().await?;
    let duplicates: Vec<String> = source
        .ids()
        .filter(|id| archived.contains(id))
        .cloned()
        .collect();
    if duplicates.is_empty() {
        return Ok(0);
    }
    let removed = source.remove_many(duplicates.as_slice());
    active.store(&source).await?;
    info!(removed, "removed records duplicated across partitions");
    Ok(removed)
}
