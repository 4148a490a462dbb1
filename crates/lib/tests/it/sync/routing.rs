use jobvault::{
    store::Partition,
    sync::{ConnectivityContext, RecordApi},
};

use super::fixture;
use crate::helpers::*;

#[tokio::test]
async fn test_anonymous_calls_go_to_local_replica() {
    let f = fixture().await;
    for online in [false, true] {
        let ctx = ConnectivityContext::new(false, online);
        let title = format!("online={online}");
        let record = f
            .sync
            .create(ctx, Partition::Active, input(&title, "Acme"))
            .await
            .unwrap();

        assert!(f.local.list(Partition::Active).await.unwrap().contains(&record.id));
        assert!(f.sync.list(ctx, Partition::Active).await.unwrap().contains(&record.id));
    }
    assert!(f.remote.list(Partition::Active).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_authenticated_online_calls_go_to_remote() {
    let f = fixture().await;
    let ctx = ConnectivityContext::new(true, true);

    let record = f
        .sync
        .create(ctx, Partition::Active, input("Engineer", "Acme").with_tags(["rust"]))
        .await
        .unwrap();
    let updated = f
        .sync
        .update(
            ctx,
            Partition::Active,
            &record.id,
            input("Engineer", "Acme").with_interview_date("2025-02-01"),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, jobvault::store::Status::Interview);
    assert_eq!(f.sync.tags(ctx, Partition::Active).await.unwrap().len(), 0);

    assert_eq!(f.sync.archive(ctx, &[record.id.clone()]).await.unwrap(), 1);
    assert!(
        f.remote
            .list(Partition::Archive)
            .await
            .unwrap()
            .contains(&record.id)
    );
    assert_eq!(
        f.sync
            .delete(ctx, Partition::Archive, &[record.id.clone()])
            .await
            .unwrap(),
        1
    );
    assert!(f.local.list(Partition::Active).await.unwrap().is_empty());
    assert!(f.local.list(Partition::Archive).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_authenticated_offline_refuses_without_touching_replicas() {
    let f = fixture().await;
    let online = ConnectivityContext::new(true, true);
    let offline = ConnectivityContext::new(true, false);

    let remote_record = f
        .sync
        .create(online, Partition::Active, input("Remote", "Acme"))
        .await
        .unwrap();
    let local_record = f
        .local
        .create(Partition::Active, input("Local", "Acme"))
        .await
        .unwrap();
    let remote_before = f.remote.list(Partition::Active).await.unwrap();
    let local_before = f.local.list(Partition::Active).await.unwrap();

    let ids = vec![remote_record.id.clone(), local_record.id.clone()];
    let errors = [
        f.sync
            .create(offline, Partition::Active, input("Offline", "Acme"))
            .await
            .unwrap_err(),
        f.sync
            .update(offline, Partition::Active, &remote_record.id, input("Edited", "Acme"))
            .await
            .unwrap_err(),
        f.sync
            .delete(offline, Partition::Active, &ids)
            .await
            .unwrap_err(),
        f.sync.archive(offline, &ids).await.unwrap_err(),
        f.sync
            .bulk_import(offline, Partition::Active, vec![local_record.clone()])
            .await
            .unwrap_err(),
        f.sync.list(offline, Partition::Active).await.unwrap_err(),
        f.sync.tags(offline, Partition::Active).await.unwrap_err(),
    ];
    for err in errors {
        assert!(err.is_paused_offline(), "{err}");
    }

    assert_eq!(f.remote.list(Partition::Active).await.unwrap(), remote_before);
    assert_eq!(f.local.list(Partition::Active).await.unwrap(), local_before);
    assert!(f.remote.list(Partition::Archive).await.unwrap().is_empty());
    assert!(f.local.list(Partition::Archive).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_route_stops_after_logout() {
    let f = fixture().await;
    let ctx = ConnectivityContext::new(true, true);
    f.sync.list(ctx, Partition::Active).await.unwrap();

    f.service.logout(f.remote.session_id()).await.unwrap();
    let err = f.sync.list(ctx, Partition::Active).await.unwrap_err();
    assert!(err.is_authentication_error());
}
