use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use jobvault::{
    Clock, FixedClock,
    backend::{InMemory, KvBackend},
    store::{
        MAX_JOB_DESCRIPTION_CHARS, Partition, Record, RecordInput, RecordStore, Status, blob_key,
    },
};

use crate::helpers::*;

fn store_for(backend: Arc<InMemory>, user: &str, clock: Arc<FixedClock>) -> RecordStore {
    RecordStore::new(blob_store(backend), user, Partition::Active, clock)
}

fn active_store() -> (RecordStore, Arc<InMemory>, Arc<FixedClock>) {
    let backend = Arc::new(InMemory::new());
    let clock = clock();
    (store_for(backend.clone(), USER, clock.clone()), backend, clock)
}

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let (store, _, _) = active_store();

    let created = store
        .create(RecordInput::new("A", "B", Status::New, "2025-01-01"))
        .await
        .unwrap();
    let map = store.list().await.unwrap();
    assert_eq!(map.len(), 1);
    assert!(!created.id.is_empty());
    assert_eq!(map.get(&created.id).unwrap().status, Status::New);

    let updated = store
        .update(
            &created.id,
            RecordInput::new("A", "B", Status::New, "2025-01-01").with_interview_date("2025-02-01"),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.status, Status::Interview);
    assert!(updated.last_updated > created.last_updated);

    assert_eq!(store.delete(&created.id).await.unwrap(), 1);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_promotes_status_with_interview_date() {
    let (store, _, _) = active_store();
    let record = store
        .create(input("Engineer", "Acme").with_interview_date("2025-05-01"))
        .await
        .unwrap();
    assert_eq!(record.status, Status::Interview);
    assert_eq!(
        store.get(&record.id).await.unwrap().unwrap().status,
        Status::Interview
    );
}

#[tokio::test]
async fn test_list_initializes_empty_blob() {
    let (store, backend, _) = active_store();
    let key = blob_key(Partition::Active, USER);
    assert!(backend.get(&key).await.unwrap().is_none());

    assert!(store.list().await.unwrap().is_empty());
    assert!(backend.get(&key).await.unwrap().is_some());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_last_updated_is_stamped_by_the_store() {
    let (store, _, clock) = active_store();
    clock.set(1_800_000_000_000);
    let record = store.create(input("Engineer", "Acme")).await.unwrap();
    assert!(record.last_updated.timestamp_millis() >= 1_800_000_000_000);
    assert!(record.last_updated <= clock.now_utc());
}

#[tokio::test]
async fn test_update_missing_id_is_not_found() {
    let (store, _, _) = active_store();
    store.create(input("Engineer", "Acme")).await.unwrap();
    let before = store.list().await.unwrap();

    let err = store
        .update("does-not-exist", input("Engineer", "Acme"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.list().await.unwrap(), before);
}

#[tokio::test]
async fn test_validation_failures_leave_store_untouched() {
    let (store, _, _) = active_store();
    let existing = store.create(input("Engineer", "Acme")).await.unwrap();
    let before = store.list().await.unwrap();

    let invalid = [
        input("", "Acme"),
        input("Engineer", "   "),
        RecordInput {
            status: None,
            ..input("Engineer", "Acme")
        },
        RecordInput::new("Engineer", "Acme", Status::New, ""),
        RecordInput::new("Engineer", "Acme", Status::New, "01/02/2025"),
        input("Engineer", "Acme").with_interview_date("soon"),
        input("Engineer", "Acme").with_job_description("x".repeat(MAX_JOB_DESCRIPTION_CHARS + 1)),
    ];
    for bad in invalid {
        let err = store.create(bad.clone()).await.unwrap_err();
        assert!(err.is_validation_error(), "{bad:?}: {err}");
        let err = store.update(&existing.id, bad).await.unwrap_err();
        assert!(err.is_validation_error());
    }
    assert_eq!(store.list().await.unwrap(), before);
}

#[tokio::test]
async fn test_description_at_limit_is_accepted() {
    let (store, _, _) = active_store();
    let record = store
        .create(input("Engineer", "Acme").with_job_description("é".repeat(MAX_JOB_DESCRIPTION_CHARS)))
        .await
        .unwrap();
    assert_eq!(record.job_description.chars().count(), MAX_JOB_DESCRIPTION_CHARS);
}

#[tokio::test]
async fn test_tags_are_normalized_and_listed() {
    let (store, _, _) = active_store();
    let record = store
        .create(input("Engineer", "Acme").with_tags([" rust ", "remote", "", "rust"]))
        .await
        .unwrap();
    assert_eq!(record.tags, vec!["rust", "remote"]);

    store
        .create(input("SRE", "Initech").with_tags(["oncall", "remote"]))
        .await
        .unwrap();
    assert_eq!(store.tags().await.unwrap(), vec!["oncall", "remote", "rust"]);
}

#[tokio::test]
async fn test_delete_many_is_idempotent() {
    let (store, _, _) = active_store();
    let a = store.create(input("A", "Acme")).await.unwrap();
    let b = store.create(input("B", "Acme")).await.unwrap();

    let ids = vec![a.id.clone(), "ghost".to_string()];
    assert_eq!(store.delete_many(&ids).await.unwrap(), 1);
    assert_eq!(store.delete_many(&ids).await.unwrap(), 0);
    let remaining = store.list().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains(&b.id));
}

#[tokio::test]
async fn test_bulk_upsert_trusts_incoming_timestamps() {
    let (store, _, _) = active_store();
    let existing = store.create(input("Engineer", "Acme")).await.unwrap();

    let mut stale = existing.clone();
    stale.company = "Stale".to_string();
    stale.last_updated = existing.last_updated - ChronoDuration::days(1);

    let mut newer = existing.clone();
    newer.id = "imported".to_string();
    newer.company = "Imported".to_string();
    newer.last_updated = existing.last_updated - ChronoDuration::days(30);

    let applied = store.bulk_upsert(vec![stale, newer.clone()]).await.unwrap();
    assert_eq!(applied, 1);

    let map = store.list().await.unwrap();
    assert_eq!(map.get(&existing.id).unwrap().company, "Acme");
    // New ids are inserted with their own timestamp, not restamped.
    assert_eq!(map.get("imported"), Some(&newer));
}

#[tokio::test]
async fn test_bulk_upsert_applies_status_rule() {
    let (store, _, clock) = active_store();
    let record = Record {
        id: "csv-1".to_string(),
        job_title: "Engineer".to_string(),
        company: "Acme".to_string(),
        status: Status::Assessment,
        tags: vec![],
        application_date: "2025-01-01".parse().unwrap(),
        interview_date: Some("2025-02-01".parse().unwrap()),
        job_description: String::new(),
        last_updated: clock.now_utc(),
    };
    store.bulk_upsert(vec![record]).await.unwrap();
    assert_eq!(
        store.get("csv-1").await.unwrap().unwrap().status,
        Status::Interview
    );
}

#[tokio::test]
async fn test_users_and_partitions_are_isolated() {
    let backend = Arc::new(InMemory::new());
    let clock = clock();
    let ada = store_for(backend.clone(), USER, clock.clone());
    let bob = store_for(backend.clone(), "bob@example.com", clock.clone());
    let ada_archive = RecordStore::new(
        blob_store(backend.clone()),
        USER,
        Partition::Archive,
        clock,
    );

    ada.create(input("Engineer", "Acme")).await.unwrap();
    assert_eq!(ada.list().await.unwrap().len(), 1);
    assert!(bob.list().await.unwrap().is_empty());
    assert!(ada_archive.list().await.unwrap().is_empty());

    let mut keys = backend.keys().await.unwrap();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "active:ada@example.com",
            "active:bob@example.com",
            "archive:ada@example.com"
        ]
    );
}
