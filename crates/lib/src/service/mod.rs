//! The server-side boundary: session-gated record operations.
//!
//! Every record operation takes a [`Principal`], which only
//! [`RecordService::authorize`] can produce, so no partition is reachable
//! without a validated session.

mod handle;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

pub use handle::SessionHandle;

use crate::{
    Clock, Result,
    auth::{
        AuthError, Identity, IdentityVerifier, Session, SessionManager, SessionState,
        SignedAssertionVerifier,
    },
    backend::KvBackend,
    config::ServiceConfig,
    store::{
        EncryptedBlobStore, EncryptionKey, Partition, Record, RecordInput, RecordMap, RecordStore,
        archive,
    },
};

/// The authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    identity: Identity,
    expires_at: DateTime<Utc>,
    refreshed: bool,
}

impl Principal {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// The session's expiry was extended while authorizing this request.
    pub fn refreshed(&self) -> bool {
        self.refreshed
    }
}

/// Sessions plus encrypted per-user record partitions.
pub struct RecordService {
    sessions: SessionManager,
    blobs: EncryptedBlobStore,
    clock: Arc<dyn Clock>,
    secure_cookies: bool,
}

impl RecordService {
    /// Build the service, verifying assertions as `config.identity` describes.
    pub fn new(
        config: &ServiceConfig,
        records: Arc<dyn KvBackend>,
        sessions: Arc<dyn KvBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let verifier = SignedAssertionVerifier::from_config(
            &config.identity,
            config.session.verify_timeout,
            clock.clone(),
        )?;
        Self::with_verifier(config, records, sessions, Arc::new(verifier), clock)
    }

    /// Build the service around a caller-supplied verifier.
    pub fn with_verifier(
        config: &ServiceConfig,
        records: Arc<dyn KvBackend>,
        sessions: Arc<dyn KvBackend>,
        verifier: Arc<dyn IdentityVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.session.validate()?;
        let key = EncryptionKey::derive(config.encryption_secret.as_str(), &config.kdf_salt)?;
        Ok(Self {
            sessions: SessionManager::new(
                sessions,
                verifier,
                clock.clone(),
                config.session.clone(),
            ),
            blobs: EncryptedBlobStore::new(records, key),
            clock,
            secure_cookies: config.secure_cookies,
        })
    }

    pub fn session_lifetime(&self) -> Duration {
        self.sessions.config().lifetime
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    /// Verify an identity proof and open a session.
    pub async fn login(&self, proof: &str) -> Result<Session> {
        self.sessions.verify_identity(proof).await
    }

    pub async fn logout(&self, session_id: &str) -> Result<()> {
        self.sessions.revoke(session_id).await
    }

    /// Resolve a session id to its principal, refreshing it if due.
    pub async fn authorize(&self, session_id: &str) -> Result<Principal> {
        match self.sessions.validate(session_id).await? {
            SessionState::Anonymous => Err(AuthError::NotAuthenticated.into()),
            SessionState::Authenticated {
                identity,
                expires_at,
                refreshed,
            } => Ok(Principal {
                identity,
                expires_at,
                refreshed,
            }),
        }
    }

    /// The identity behind a session.
    pub async fn current_user(&self, session_id: &str) -> Result<Principal> {
        self.authorize(session_id).await
    }

    /// An in-process [`RecordApi`](crate::sync::RecordApi) acting as `session_id`.
    pub fn bind(self: &Arc<Self>, session_id: impl Into<String>) -> SessionHandle {
        SessionHandle::new(self.clone(), session_id.into())
    }

    fn store(&self, principal: &Principal, partition: Partition) -> RecordStore {
        RecordStore::new(
            self.blobs.clone(),
            principal.username(),
            partition,
            self.clock.clone(),
        )
    }

    pub async fn records(&self, principal: &Principal, partition: Partition) -> Result<RecordMap> {
        self.store(principal, partition).list().await
    }

    pub async fn create_record(
        &self,
        principal: &Principal,
        partition: Partition,
        input: RecordInput,
    ) -> Result<Record> {
        self.store(principal, partition).create(input).await
    }

    pub async fn update_record(
        &self,
        principal: &Principal,
        partition: Partition,
        id: &str,
        input: RecordInput,
    ) -> Result<Record> {
        self.store(principal, partition).update(id, input).await
    }

    pub async fn delete_records(
        &self,
        principal: &Principal,
        partition: Partition,
        ids: &[String],
    ) -> Result<usize> {
        self.store(principal, partition).delete_many(ids).await
    }

    /// Move records from the principal's active partition to their archive.
    pub async fn archive(&self, principal: &Principal, ids: &[String]) -> Result<usize> {
        let active = self.store(principal, Partition::Active);
        let archived = self.store(principal, Partition::Archive);
        let moved = archive::transfer(&active, &archived, ids).await?;
        debug!(user = principal.username(), requested = ids.len(), moved, "archive");
        Ok(moved)
    }

    pub async fn bulk_import(
        &self,
        principal: &Principal,
        partition: Partition,
        records: Vec<Record>,
    ) -> Result<usize> {
        self.store(principal, partition).bulk_upsert(records).await
    }

    pub async fn tags(&self, principal: &Principal, partition: Partition) -> Result<Vec<String>> {
        self.store(principal, partition).tags().await
    }

    /// Drop active records that also exist in the archive, left behind by an
    /// archive transfer interrupted between its two writes.
    pub async fn repair_partitions(&self, principal: &Principal) -> Result<usize> {
        let active = self.store(principal, Partition::Active);
        let archived = self.store(principal, Partition::Archive);
        let removed = archive::dedup_after_interrupted_transfer(&active, &archived).await?;
        if removed > 0 {
            info!(user = principal.username(), removed, "repaired partitions");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for RecordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordService")
            .field("sessions", &self.sessions)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}
