use std::sync::Arc;

use jobvault::{
    backend::{InMemory, KvBackend},
    constants::{LOCAL_ACTIVE_KEY, LOCAL_ARCHIVE_KEY},
    replica::LocalReplica,
    store::{Partition, RecordMap, Status},
    sync::RecordApi,
};

use crate::helpers::*;

fn replica() -> (LocalReplica, Arc<InMemory>) {
    let storage = Arc::new(InMemory::new());
    (LocalReplica::new(storage.clone(), clock()), storage)
}

#[tokio::test]
async fn test_local_crud_is_plaintext_under_fixed_keys() {
    let (replica, storage) = replica();

    // Listing an absent partition does not write it.
    assert!(replica.list(Partition::Active).await.unwrap().is_empty());
    assert!(storage.get(LOCAL_ACTIVE_KEY).await.unwrap().is_none());

    let record = replica
        .create(
            Partition::Active,
            input("Engineer", "Acme").with_interview_date("2025-03-01"),
        )
        .await
        .unwrap();
    assert_eq!(record.status, Status::Interview);

    let raw = storage.get(LOCAL_ACTIVE_KEY).await.unwrap().unwrap();
    let stored: RecordMap = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.get(&record.id), Some(&record));
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json[&record.id]["jobTitle"], "Engineer");
    assert_eq!(json[&record.id]["interviewDate"], "2025-03-01");

    let updated = replica
        .update(Partition::Active, &record.id, input("Staff Engineer", "Acme"))
        .await
        .unwrap();
    assert_eq!(updated.job_title, "Staff Engineer");
    assert_eq!(updated.status, Status::New);
    assert!(updated.last_updated > record.last_updated);

    assert_eq!(
        replica
            .delete(Partition::Active, &[record.id.clone()])
            .await
            .unwrap(),
        1
    );
    assert!(replica.list(Partition::Active).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_local_update_of_missing_id_is_not_found() {
    let (replica, _) = replica();
    let err = replica
        .update(Partition::Active, "nope", input("Engineer", "Acme"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_local_corrupted_partition_is_reported() {
    let (replica, storage) = replica();
    storage
        .put(LOCAL_ACTIVE_KEY, "[1, 2, 3]".to_string())
        .await
        .unwrap();

    let err = replica.list(Partition::Active).await.unwrap_err();
    assert!(err.is_corrupted());
    assert!(
        replica
            .create(Partition::Active, input("Engineer", "Acme"))
            .await
            .unwrap_err()
            .is_corrupted()
    );
    // Left for the user to inspect, never overwritten.
    assert_eq!(
        storage.get(LOCAL_ACTIVE_KEY).await.unwrap().as_deref(),
        Some("[1, 2, 3]")
    );
}

#[tokio::test]
async fn test_local_archive_and_tags() {
    let (replica, storage) = replica();
    let a = replica
        .create(Partition::Active, input("A", "Acme").with_tags(["rust"]))
        .await
        .unwrap();
    let b = replica
        .create(Partition::Active, input("B", "Acme").with_tags(["go"]))
        .await
        .unwrap();

    assert_eq!(replica.archive(&[a.id.clone()]).await.unwrap(), 1);
    assert_eq!(replica.archive(&[a.id.clone()]).await.unwrap(), 0);

    assert_eq!(replica.tags(Partition::Active).await.unwrap(), vec!["go"]);
    assert_eq!(replica.tags(Partition::Archive).await.unwrap(), vec!["rust"]);
    assert!(storage.get(LOCAL_ARCHIVE_KEY).await.unwrap().is_some());

    let active = replica.list(Partition::Active).await.unwrap();
    assert!(active.contains(&b.id) && !active.contains(&a.id));
    assert_eq!(
        replica.list(Partition::Archive).await.unwrap().get(&a.id),
        Some(&a)
    );
}

#[tokio::test]
async fn test_local_repair_and_clear() {
    let (replica, storage) = replica();
    let record = replica
        .create(Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();
    // Simulate a transfer that wrote the archive but not the active partition.
    replica
        .bulk_import(Partition::Archive, vec![record.clone()])
        .await
        .unwrap();

    assert_eq!(replica.repair().await.unwrap(), 1);
    assert!(replica.list(Partition::Active).await.unwrap().is_empty());
    assert_eq!(replica.repair().await.unwrap(), 0);

    replica.clear().await.unwrap();
    assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_local_record_stays_in_one_partition() {
    let (replica, _) = replica();
    let record = replica
        .create(Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();
    replica.archive(&[record.id.clone()]).await.unwrap();

    let applied = replica
        .bulk_import(Partition::Active, vec![record.clone()])
        .await
        .unwrap();
    assert_eq!(applied, 0);
    let err = replica
        .create(Partition::Active, input("Engineer", "Acme").with_id(record.id.clone()))
        .await
        .unwrap_err();
    assert!(err.is_validation_error());

    assert!(replica.list(Partition::Active).await.unwrap().is_empty());
    assert_eq!(replica.list(Partition::Archive).await.unwrap().len(), 1);
}
