use std::{sync::Arc, time::Duration};

use jobvault::{
    Error,
    auth::AuthError,
    backend::{InMemory, KvBackend},
    replica::LocalReplica,
    store::{Partition, Status, StoreError, blob_key},
    sync::{ConnectivityContext, RecordApi, RemoteClient, SyncError, Synchronizer},
};
use url::Url;

use crate::helpers::*;

fn client(base: &Url) -> RemoteClient {
    RemoteClient::new(base.clone(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_login_crud_and_logout_over_http() {
    let clock = clock();
    let (service, _) = test_service(clock.clone());
    let base = spawn_api(service).await;
    let remote = client(&base);

    let identity = remote.login(&token_for(USER, &clock)).await.unwrap();
    assert_eq!(identity.username, USER);
    assert_eq!(remote.current_user().await.unwrap(), identity);

    assert!(remote.list(Partition::Active).await.unwrap().is_empty());
    let created = remote
        .create(
            Partition::Active,
            input("Engineer", "Acme").with_tags(["rust", "remote"]),
        )
        .await
        .unwrap();
    let updated = remote
        .update(
            Partition::Active,
            &created.id,
            input("Engineer", "Acme").with_interview_date("2025-02-01"),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, Status::Interview);
    assert_eq!(
        remote.list(Partition::Active).await.unwrap().get(&created.id),
        Some(&updated)
    );

    let other = remote
        .create(Partition::Active, input("SRE", "Initech").with_tags(["oncall"]))
        .await
        .unwrap();
    assert_eq!(remote.tags(Partition::Active).await.unwrap(), vec!["oncall"]);

    assert_eq!(remote.archive(&[other.id.clone()]).await.unwrap(), 1);
    assert!(
        remote
            .list(Partition::Archive)
            .await
            .unwrap()
            .contains(&other.id)
    );

    let ids = vec![created.id.clone(), "ghost".to_string()];
    assert_eq!(remote.delete(Partition::Active, &ids).await.unwrap(), 1);
    assert_eq!(remote.delete(Partition::Active, &ids).await.unwrap(), 0);

    remote.logout().await.unwrap();
    let err = remote.list(Partition::Active).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn test_requests_without_session_are_unauthorized() {
    let clock = clock();
    let (service, _) = test_service(clock);
    let remote = client(&spawn_api(service).await);

    assert!(
        remote
            .list(Partition::Active)
            .await
            .unwrap_err()
            .is_authentication_error()
    );
    assert!(
        remote
            .create(Partition::Active, input("Engineer", "Acme"))
            .await
            .unwrap_err()
            .is_authentication_error()
    );
    assert!(remote.current_user().await.unwrap_err().is_authentication_error());
    assert!(
        remote
            .login("forged.token.value")
            .await
            .unwrap_err()
            .is_authentication_error()
    );
}

#[tokio::test]
async fn test_error_statuses_map_back_to_errors() {
    let clock = clock();
    let (service, _) = test_service(clock.clone());
    let remote = client(&spawn_api(service).await);
    remote.login(&token_for(USER, &clock)).await.unwrap();

    let err = remote
        .update(Partition::Active, "missing-id", input("Engineer", "Acme"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = remote
        .create(Partition::Active, input("", "Acme"))
        .await
        .unwrap_err();
    match &err {
        Error::Store(StoreError::Validation { field, reason }) => {
            assert_eq!(field, "jobTitle");
            assert_eq!(reason, "must not be empty");
        }
        other => panic!("expected a jobTitle validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_store_damage_keeps_its_kind() {
    let clock = clock();
    let (service, records) = test_service(clock.clone());
    let remote = Arc::new(client(&spawn_api(service).await));
    let local = Arc::new(LocalReplica::new(Arc::new(InMemory::new()), clock.clone()));
    let sync = Synchronizer::new(local, remote.clone());
    remote.login(&token_for(USER, &clock)).await.unwrap();
    let signed_in = ConnectivityContext::new(true, true);

    // Authenticates but is not a record mapping.
    blob_store(records.clone())
        .put(&blob_key(Partition::Active, USER), &vec!["not", "records"])
        .await
        .unwrap();
    let err = sync.list(signed_in, Partition::Active).await.unwrap_err();
    assert!(err.is_corrupted(), "{err:?}");
    assert!(!err.is_decryption_error());

    // Fails authentication.
    records
        .put(
            &blob_key(Partition::Archive, USER),
            "bm90IGEgcmVhbCBibG9i".to_string(),
        )
        .await
        .unwrap();
    let err = sync.list(signed_in, Partition::Archive).await.unwrap_err();
    assert!(err.is_decryption_error(), "{err:?}");
    assert!(!err.is_corrupted());
}

#[tokio::test]
async fn test_users_cannot_see_each_other() {
    let clock = clock();
    let (service, _) = test_service(clock.clone());
    let base = spawn_api(service).await;
    let ada = client(&base);
    let bob = client(&base);
    ada.login(&token_for(USER, &clock)).await.unwrap();
    bob.login(&token_for("bob@example.com", &clock)).await.unwrap();

    let record = ada
        .create(Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();
    assert!(bob.list(Partition::Active).await.unwrap().is_empty());
    assert!(
        bob.update(Partition::Active, &record.id, input("Mine", "Now"))
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert_eq!(bob.delete(Partition::Active, &[record.id.clone()]).await.unwrap(), 0);
    assert_eq!(ada.list(Partition::Active).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_synchronizer_imports_local_records_over_http() {
    let clock = clock();
    let (service, _) = test_service(clock.clone());
    let remote = Arc::new(client(&spawn_api(service).await));
    let local = Arc::new(LocalReplica::new(Arc::new(InMemory::new()), clock.clone()));
    let sync = Synchronizer::new(local.clone(), remote.clone());

    // Anonymous: records go to the device.
    let anonymous = ConnectivityContext::new(false, true);
    let record = sync
        .create(anonymous, Partition::Active, input("Engineer", "Acme"))
        .await
        .unwrap();

    remote.login(&token_for(USER, &clock)).await.unwrap();
    let signed_in = ConnectivityContext::new(true, true);
    let summary = sync.import_local(signed_in).await.unwrap();
    assert_eq!(summary.submitted, 1);
    assert_eq!(summary.applied, 1);

    let remote_records = sync.list(signed_in, Partition::Active).await.unwrap();
    assert_eq!(remote_records.get(&record.id), Some(&record));
    assert!(local.list(Partition::Active).await.unwrap().contains(&record.id));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = client(&Url::parse(&format!("http://{addr}/")).unwrap());
    let err = remote.list(Partition::Active).await.unwrap_err();
    assert!(matches!(err, Error::Sync(SyncError::ConnectionFailed { .. })));
    assert!(err.is_network_error());
}
