//! Session lifecycle: mint on verified login, sliding refresh on use, delete
//! on logout or expiry.
//!
//! Sessions are JSON records `{identity, expiresAt}` in their own
//! [`KvBackend`] namespace, keyed by an unguessable UUID v4 session id.
//!
//! [`SessionManager::validate`] is not a pure read: it deletes expired
//! sessions and rewrites sessions close to expiry. No lock is held between the
//! read and the write; two requests racing to refresh the same session both
//! extend it, which is harmless. The refresh only rewrites a record that still
//! exists, so a logout that lands mid-refresh stays logged out.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    errors::AuthError,
    identity::{Identity, IdentityVerifier},
};
use crate::{
    Clock, Result, backend::KvBackend, clock::millis_to_utc, config::SessionConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    identity: Identity,
    /// Milliseconds since epoch.
    expires_at: u64,
}

/// A freshly minted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of [`SessionManager::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated {
        identity: Identity,
        expires_at: DateTime<Utc>,
        /// The expiry was extended by this validation.
        refreshed: bool,
    },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated { identity, .. } => Some(identity),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Issues, validates, refreshes and revokes sessions.
pub struct SessionManager {
    sessions: Arc<dyn KvBackend>,
    verifier: Arc<dyn IdentityVerifier>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn KvBackend>,
        verifier: Arc<dyn IdentityVerifier>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions,
            verifier,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Verify `proof` and mint a session for the identity it asserts.
    ///
    /// Verification is bounded by `verify_timeout`; running out of time fails
    /// with [`AuthError::VerificationTimedOut`]. No session is created on any
    /// failure.
    pub async fn verify_identity(&self, proof: &str) -> Result<Session> {
        let timeout = self.config.verify_timeout;
        let identity = match tokio::time::timeout(timeout, self.verifier.verify(proof)).await {
            Err(_) => {
                warn!(?timeout, "identity verification timed out");
                return Err(AuthError::VerificationTimedOut { timeout }.into());
            }
            Ok(Err(e)) if e.is_authentication_error() => {
                info!(error = %e, "identity assertion rejected");
                return Err(e);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "identity verification failed");
                return Err(AuthError::invalid(e.to_string()).into());
            }
            Ok(Ok(identity)) => identity,
        };

        let id = uuid::Uuid::new_v4().to_string();
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(duration_millis(self.config.lifetime));
        self.write(&id, &identity, expires_at).await?;
        info!(user = %identity.username, "session created");
        Ok(Session {
            id,
            identity,
            expires_at: millis_to_utc(expires_at),
        })
    }

    /// Resolve a session id.
    ///
    /// Absent, malformed and expired sessions are `Anonymous`; the latter two
    /// are deleted. A session with less than `refresh_threshold` remaining has
    /// its expiry pushed to `now + lifetime`.
    pub async fn validate(&self, session_id: &str) -> Result<SessionState> {
        if session_id.is_empty() {
            return Ok(SessionState::Anonymous);
        }
        let Some(raw) = self.sessions.get(session_id).await? else {
            return Ok(SessionState::Anonymous);
        };
        let record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "discarding malformed session record");
                self.sessions.delete(session_id).await?;
                return Ok(SessionState::Anonymous);
            }
        };

        let now = self.clock.now_millis();
        if record.expires_at < now {
            debug!(user = %record.identity.username, "session expired");
            self.sessions.delete(session_id).await?;
            return Ok(SessionState::Anonymous);
        }

        let remaining = record.expires_at - now;
        if remaining < duration_millis(self.config.refresh_threshold) {
            let expires_at = now.saturating_add(duration_millis(self.config.lifetime));
            let refreshed = SessionRecord {
                identity: record.identity.clone(),
                expires_at,
            };
            let written = self
                .sessions
                .put_if_present(session_id, serde_json::to_string(&refreshed)?)
                .await?;
            if !written {
                debug!(user = %record.identity.username, "session revoked during refresh");
                return Ok(SessionState::Anonymous);
            }
            debug!(user = %record.identity.username, "session refreshed");
            return Ok(SessionState::Authenticated {
                identity: record.identity,
                expires_at: millis_to_utc(expires_at),
                refreshed: true,
            });
        }

        Ok(SessionState::Authenticated {
            identity: record.identity,
            expires_at: millis_to_utc(record.expires_at),
            refreshed: false,
        })
    }

    /// Delete the session. Revoking an unknown id is not an error.
    pub async fn revoke(&self, session_id: &str) -> Result<()> {
        if session_id.is_empty() {
            return Ok(());
        }
        self.sessions.delete(session_id).await?;
        debug!("session revoked");
        Ok(())
    }

    async fn write(&self, session_id: &str, identity: &Identity, expires_at: u64) -> Result<()> {
        let record = SessionRecord {
            identity: identity.clone(),
            expires_at,
        };
        self.sessions
            .put(session_id, serde_json::to_string(&record)?)
            .await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
