use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use jobvault::store::{Partition, RecordInput};

use crate::helpers::*;

#[tokio::test]
async fn test_archive_moves_records_unchanged() {
    let clock = clock();
    let (service, _) = test_service(clock.clone());
    let session = login(&service, USER, &clock).await;
    let principal = service.authorize(&session).await.unwrap();

    let keep = service
        .create_record(&principal, Partition::Active, input("Keep", "Acme"))
        .await
        .unwrap();
    let moving = service
        .create_record(&principal, Partition::Active, input("Move", "Initech"))
        .await
        .unwrap();

    let moved = service
        .archive(&principal, &[moving.id.clone(), "ghost".to_string()])
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let active = service.records(&principal, Partition::Active).await.unwrap();
    let archive = service.records(&principal, Partition::Archive).await.unwrap();
    assert!(active.contains(&keep.id));
    assert!(!active.contains(&moving.id));
    // Archived copies keep their id and lastUpdated.
    assert_eq!(archive.get(&moving.id), Some(&moving));
}

#[tokio::test]
async fn test_archive_of_already_archived_id_is_noop() {
    let clock = clock();
    let (service, _) = test_service(clock.clone());
    let session = login(&service, USER, &clock).await;
    let principal = service.authorize(&session).await.unwrap();

    let record = service
        .create_record(&principal, Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();
    let ids = vec![record.id.clone()];
    assert_eq!(service.archive(&principal, &ids).await.unwrap(), 1);

    let active_before = service.records(&principal, Partition::Active).await.unwrap();
    let archive_before = service.records(&principal, Partition::Archive).await.unwrap();

    assert_eq!(service.archive(&principal, &ids).await.unwrap(), 0);
    assert_eq!(
        service.records(&principal, Partition::Active).await.unwrap(),
        active_before
    );
    assert_eq!(
        service.records(&principal, Partition::Archive).await.unwrap(),
        archive_before
    );
}

#[tokio::test]
async fn test_interrupted_archive_duplicates_then_repairs() {
    let clock = clock();
    let backend = Arc::new(FailingBackend::default());
    let service = service_with(backend.clone(), clock.clone());
    let session = login(&service, USER, &clock).await;
    let principal = service.authorize(&session).await.unwrap();

    let record = service
        .create_record(&principal, Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();

    // Archive write succeeds, removal from active fails.
    backend.fail_puts_with_prefix(Some("active:"));
    let err = service
        .archive(&principal, &[record.id.clone()])
        .await
        .unwrap_err();
    assert!(err.is_backend_error());

    let active = service.records(&principal, Partition::Active).await.unwrap();
    let archive = service.records(&principal, Partition::Archive).await.unwrap();
    assert!(active.contains(&record.id));
    assert!(archive.contains(&record.id));

    backend.fail_puts_with_prefix(None);
    assert_eq!(service.repair_partitions(&principal).await.unwrap(), 1);
    assert!(
        service
            .records(&principal, Partition::Active)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        service
            .records(&principal, Partition::Archive)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(service.repair_partitions(&principal).await.unwrap(), 0);
}

#[tokio::test]
async fn test_archive_failure_before_first_write_changes_nothing() {
    let clock = clock();
    let backend = Arc::new(FailingBackend::default());
    let service = service_with(backend.clone(), clock.clone());
    let session = login(&service, USER, &clock).await;
    let principal = service.authorize(&session).await.unwrap();

    let record = service
        .create_record(&principal, Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();
    // Initialize the archive blob so the failing put is the transfer's own.
    service.records(&principal, Partition::Archive).await.unwrap();

    backend.fail_puts_with_prefix(Some("archive:"));
    assert!(service.archive(&principal, &[record.id.clone()]).await.is_err());
    backend.fail_puts_with_prefix(None);

    assert!(
        service
            .records(&principal, Partition::Active)
            .await
            .unwrap()
            .contains(&record.id)
    );
    assert!(
        service
            .records(&principal, Partition::Archive)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_archived_record_is_not_revived_in_active() {
    let clock = clock();
    let (service, _) = test_service(clock.clone());
    let session = login(&service, USER, &clock).await;
    let principal = service.authorize(&session).await.unwrap();

    let record = service
        .create_record(&principal, Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();
    service
        .archive(&principal, &[record.id.clone()])
        .await
        .unwrap();

    // A newer copy from a device that never saw the archive.
    let mut stale_device_copy = record.clone();
    stale_device_copy.company = "Edited elsewhere".to_string();
    stale_device_copy.last_updated = record.last_updated + ChronoDuration::seconds(5);
    let applied = service
        .bulk_import(&principal, Partition::Active, vec![stale_device_copy])
        .await
        .unwrap();
    assert_eq!(applied, 0);

    let err = service
        .create_record(
            &principal,
            Partition::Active,
            RecordInput::from(&record),
        )
        .await
        .unwrap_err();
    assert!(err.is_validation_error());

    let active = service.records(&principal, Partition::Active).await.unwrap();
    let archive = service.records(&principal, Partition::Archive).await.unwrap();
    assert!(!active.contains(&record.id));
    assert_eq!(archive.get(&record.id), Some(&record));
    assert_eq!(service.repair_partitions(&principal).await.unwrap(), 0);
}
