use std::sync::Arc;

use async_trait::async_trait;

use super::RecordService;
use crate::{
    Result,
    store::{Partition, Record, RecordInput, RecordMap},
    sync::RecordApi,
};

/// A [`RecordService`] bound to one session id.
///
/// Each call authorizes the session afresh, exactly as an HTTP request would,
/// so the handle stops working once the session is revoked or expires.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    service: Arc<RecordService>,
    session_id: String,
}

impl SessionHandle {
    pub(super) fn new(service: Arc<RecordService>, session_id: String) -> Self {
        Self {
            service,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl RecordApi for SessionHandle {
    async fn list(&self, partition: Partition) -> Result<RecordMap> {
        let principal = self.service.authorize(&self.session_id).await?;
        self.service.records(&principal, partition).await
    }

    async fn create(&self, partition: Partition, input: RecordInput) -> Result<Record> {
        let principal = self.service.authorize(&self.session_id).await?;
        self.service.create_record(&principal, partition, input).await
    }

    async fn update(&self, partition: Partition, id: &str, input: RecordInput) -> Result<Record> {
        let principal = self.service.authorize(&self.session_id).await?;
        self.service
            .update_record(&principal, partition, id, input)
            .await
    }

    async fn delete(&self, partition: Partition, ids: &[String]) -> Result<usize> {
        let principal = self.service.authorize(&self.session_id).await?;
        self.service.delete_records(&principal, partition, ids).await
    }

    async fn archive(&self, ids: &[String]) -> Result<usize> {
        let principal = self.service.authorize(&self.session_id).await?;
        self.service.archive(&principal, ids).await
    }

    async fn bulk_import(&self, partition: Partition, records: Vec<Record>) -> Result<usize> {
        let principal = self.service.authorize(&self.session_id).await?;
        self.service.bulk_import(&principal, partition, records).await
    }

    async fn tags(&self, partition: Partition) -> Result<Vec<String>> {
        let principal = self.service.authorize(&self.session_id).await?;
        self.service.tags(&principal, partition).await
    }
}
