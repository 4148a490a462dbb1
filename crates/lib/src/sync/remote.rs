//! HTTP client for the jobvault API.
//!
//! Holds the session cookie in its own cookie store, so a client that has
//! logged in acts as that session for every later call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::{error::SyncError, record_api::RecordApi};
use crate::{
    Result,
    api::envelope::{ArchiveRequest, Count, Failure, FailureKind, LoginRequest, Success},
    auth::{AuthError, Identity},
    store::{Partition, Record, RecordInput, RecordMap, StoreError},
};

/// Remote replica reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    base: Url,
    client: reqwest::Client,
}

impl RemoteClient {
    /// Client for the service at `base`, each request bounded by `timeout`.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::ConnectionFailed {
                address: base.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Exchange an identity assertion for a session.
    pub async fn login(&self, token: &str) -> Result<Identity> {
        let request = self.client.post(self.url("api/auth/login")?).json(&LoginRequest {
            token: token.to_string(),
        });
        self.send(request, None).await
    }

    pub async fn logout(&self) -> Result<()> {
        let request = self.client.post(self.url("api/auth/logout")?);
        self.send_unit(request).await
    }

    pub async fn current_user(&self) -> Result<Identity> {
        let request = self.client.get(self.url("api/auth/current-user")?);
        self.send(request, None).await
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| {
            SyncError::ConnectionFailed {
                address: self.base.to_string(),
                reason: format!("invalid path '{path}': {e}"),
            }
            .into()
        })
    }

    fn records_url(&self, partition: Partition, suffix: &str) -> Result<Url> {
        self.url(&format!("api/records/{partition}{suffix}"))
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>)> {
        let response = request.send().await.map_err(|e| SyncError::ConnectionFailed {
            address: self.base.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("failed to read response: {e}")))?;
        Ok((status, body.to_vec()))
    }

    /// Send and decode the `data` of a success envelope. `not_found_id` names
    /// the record a 404 refers to.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        not_found_id: Option<&str>,
    ) -> Result<T> {
        let (status, body) = self.dispatch(request).await?;
        if !status.is_success() {
            return Err(failure(status, &body, not_found_id));
        }
        let envelope: Success<T> = serde_json::from_slice(&body).map_err(|e| {
            SyncError::UnexpectedResponse {
                expected: "success envelope",
                actual: e.to_string(),
            }
        })?;
        envelope.data.ok_or_else(|| {
            SyncError::UnexpectedResponse {
                expected: "success envelope with data",
                actual: envelope.msg,
            }
            .into()
        })
    }

    async fn send_unit(&self, request: RequestBuilder) -> Result<()> {
        let (status, body) = self.dispatch(request).await?;
        if !status.is_success() {
            return Err(failure(status, &body, None));
        }
        Ok(())
    }
}

/// Storage key reported for corruption detected on the remote side.
const REMOTE_STORE_KEY: &str = "remote";

/// Map a failure envelope back onto the library's error taxonomy.
///
/// The envelope's `kind` decides; bodies without one fall back to the status.
fn failure(status: StatusCode, body: &[u8], not_found_id: Option<&str>) -> crate::Error {
    let (detail, kind, field) = match serde_json::from_slice::<Failure>(body) {
        Ok(f) => (f.detail, f.kind, f.field),
        Err(_) => (String::from_utf8_lossy(body).into_owned(), None, None),
    };
    debug!(status = status.as_u16(), ?kind, %detail, "remote call failed");
    let kind = kind.unwrap_or(match status {
        StatusCode::BAD_REQUEST => FailureKind::Validation,
        StatusCode::UNAUTHORIZED => FailureKind::Unauthenticated,
        StatusCode::NOT_FOUND => FailureKind::NotFound,
        StatusCode::SERVICE_UNAVAILABLE => FailureKind::PausedOffline,
        _ => FailureKind::Internal,
    });
    match kind {
        FailureKind::Validation => {
            let field = field.unwrap_or_else(|| "request".to_string());
            let reason = detail
                .strip_prefix(&format!("Invalid {field}: "))
                .map(str::to_string)
                .unwrap_or(detail);
            StoreError::Validation { field, reason }.into()
        }
        FailureKind::Unauthenticated => AuthError::NotAuthenticated.into(),
        FailureKind::NotFound => match not_found_id {
            Some(id) => StoreError::RecordNotFound { id: id.to_string() }.into(),
            None => SyncError::Remote {
                status: status.as_u16(),
                detail,
            }
            .into(),
        },
        FailureKind::Corrupted => StoreError::Corrupted {
            key: REMOTE_STORE_KEY.to_string(),
            reason: detail,
        }
        .into(),
        FailureKind::Decryption => StoreError::Decryption {
            key: REMOTE_STORE_KEY.to_string(),
            reason: detail,
        }
        .into(),
        FailureKind::PausedOffline | FailureKind::Internal => SyncError::Remote {
            status: status.as_u16(),
            detail,
        }
        .into(),
    }
}

#[async_trait]
impl RecordApi for RemoteClient {
    async fn list(&self, partition: Partition) -> Result<RecordMap> {
        let request = self.client.get(self.records_url(partition, "")?);
        self.send(request, None).await
    }

    async fn create(&self, partition: Partition, input: RecordInput) -> Result<Record> {
        let request = self
            .client
            .post(self.records_url(partition, "")?)
            .json(&input);
        self.send(request, None).await
    }

    async fn update(&self, partition: Partition, id: &str, input: RecordInput) -> Result<Record> {
        let mut url = self.records_url(partition, "/")?;
        url.path_segments_mut()
            .map_err(|_| SyncError::ConnectionFailed {
                address: self.base.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .push(id);
        let request = self.client.put(url).json(&input);
        self.send(request, Some(id)).await
    }

    async fn delete(&self, partition: Partition, ids: &[String]) -> Result<usize> {
        let request = self
            .client
            .delete(self.records_url(partition, "")?)
            .query(&[("ids", ids.join(","))]);
        let count: Count = self.send(request, None).await?;
        Ok(count.count)
    }

    async fn archive(&self, ids: &[String]) -> Result<usize> {
        let request = self.client.post(self.url("api/archive")?).json(&ArchiveRequest {
            application_ids: ids.to_vec(),
        });
        let count: Count = self.send(request, None).await?;
        Ok(count.count)
    }

    async fn bulk_import(&self, partition: Partition, records: Vec<Record>) -> Result<usize> {
        let request = self
            .client
            .post(self.records_url(partition, "/import")?)
            .json(&records);
        let count: Count = self.send(request, None).await?;
        Ok(count.count)
    }

    async fn tags(&self, partition: Partition) -> Result<Vec<String>> {
        let request = self.client.get(self.records_url(partition, "/tags")?);
        self.send(request, None).await
    }
}
