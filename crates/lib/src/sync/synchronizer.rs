//! Per-call routing between the Local Replica and the remote service.
//!
//! | authenticated | online | route          |
//! |---------------|--------|----------------|
//! | false         | any    | Local Replica  |
//! | true          | true   | remote         |
//! | true          | false  | refused        |
//!
//! Refused operations fail with [`SyncError::PausedOffline`]; nothing is
//! queued for later replay.

use std::sync::Arc;

use tracing::{debug, info};

use super::{error::SyncError, record_api::RecordApi};
use crate::{
    Result,
    auth::AuthError,
    store::{Partition, Record, RecordInput, RecordMap},
};

/// Identity and connectivity as seen by the caller at the time of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityContext {
    pub authenticated: bool,
    pub online: bool,
}

/// Where a call goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Local,
    Remote,
    Paused,
}

impl ConnectivityContext {
    pub fn new(authenticated: bool, online: bool) -> Self {
        Self {
            authenticated,
            online,
        }
    }

    pub fn route(&self) -> Route {
        match (self.authenticated, self.online) {
            (false, _) => Route::Local,
            (true, true) => Route::Remote,
            (true, false) => Route::Paused,
        }
    }
}

/// Result of [`Synchronizer::import_local`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// Local records submitted to the remote.
    pub submitted: usize,
    /// Records the remote inserted or replaced.
    pub applied: usize,
}

/// Routes record operations to exactly one replica per call.
#[derive(Clone)]
pub struct Synchronizer {
    local: Arc<dyn RecordApi>,
    remote: Arc<dyn RecordApi>,
}

impl Synchronizer {
    pub fn new(local: Arc<dyn RecordApi>, remote: Arc<dyn RecordApi>) -> Self {
        Self { local, remote }
    }

    /// The replica `ctx` selects, or [`SyncError::PausedOffline`].
    pub fn route(&self, ctx: ConnectivityContext, operation: &'static str) -> Result<&dyn RecordApi> {
        match ctx.route() {
            Route::Local => Ok(self.local.as_ref()),
            Route::Remote => Ok(self.remote.as_ref()),
            Route::Paused => {
                debug!(operation, "refusing operation while offline");
                Err(SyncError::PausedOffline { operation }.into())
            }
        }
    }

    pub async fn list(&self, ctx: ConnectivityContext, partition: Partition) -> Result<RecordMap> {
        self.route(ctx, "list")?.list(partition).await
    }

    pub async fn create(
        &self,
        ctx: ConnectivityContext,
        partition: Partition,
        input: RecordInput,
    ) -> Result<Record> {
        self.route(ctx, "create")?.create(partition, input).await
    }

    pub async fn update(
        &self,
        ctx: ConnectivityContext,
        partition: Partition,
        id: &str,
        input: RecordInput,
    ) -> Result<Record> {
        self.route(ctx, "update")?.update(partition, id, input).await
    }

    pub async fn delete(
        &self,
        ctx: ConnectivityContext,
        partition: Partition,
        ids: &[String],
    ) -> Result<usize> {
        self.route(ctx, "delete")?.delete(partition, ids).await
    }

    pub async fn archive(&self, ctx: ConnectivityContext, ids: &[String]) -> Result<usize> {
        self.route(ctx, "archive")?.archive(ids).await
    }

    pub async fn bulk_import(
        &self,
        ctx: ConnectivityContext,
        partition: Partition,
        records: Vec<Record>,
    ) -> Result<usize> {
        self.route(ctx, "import")?.bulk_import(partition, records).await
    }

    pub async fn tags(&self, ctx: ConnectivityContext, partition: Partition) -> Result<Vec<String>> {
        self.route(ctx, "tags")?.tags(partition).await
    }

    /// Push every local record, both partitions, to the remote.
    ///
    /// Run once when the user goes from anonymous to authenticated. The remote
    /// merges last-write-wins on the records' own `lastUpdated`, so a newer
    /// remote copy is kept. The Local Replica is not modified.
    pub async fn import_local(&self, ctx: ConnectivityContext) -> Result<ImportSummary> {
        match ctx.route() {
            Route::Local => return Err(AuthError::NotAuthenticated.into()),
            Route::Paused => {
                return Err(SyncError::PausedOffline {
                    operation: "import_local",
                }
                .into());
            }
            Route::Remote => {}
        }

        let mut summary = ImportSummary::default();
        for partition in [Partition::Active, Partition::Archive] {
            let records = self.local.list(partition).await?.into_records();
            if records.is_empty() {
                continue;
            }
            summary.submitted += records.len();
            summary.applied += self.remote.bulk_import(partition, records).await?;
        }
        info!(
            submitted = summary.submitted,
            applied = summary.applied,
            "imported local records"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer").finish_non_exhaustive()
    }
}
