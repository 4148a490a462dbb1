//! Error types for the synchronization module.

use thiserror::Error;

/// Errors raised while routing operations or talking to the remote service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Authenticated but offline: the operation was refused, not queued.
    #[error("Pausing updates until back online ({operation} refused)")]
    PausedOffline { operation: &'static str },

    /// The remote service could not be reached.
    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// Network communication error after the connection was made.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote answered with a body that does not match the API envelope.
    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: String,
    },

    /// The remote reported a server-side failure.
    #[error("Remote error ({status}): {detail}")]
    Remote { status: u16, detail: String },
}

impl SyncError {
    /// Check if the operation was refused because the client is offline.
    pub fn is_paused_offline(&self) -> bool {
        matches!(self, SyncError::PausedOffline { .. })
    }

    /// Check if this is a network/connection error.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::ConnectionFailed { .. }
        )
    }

    /// Check if this is a protocol error (unexpected response).
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, SyncError::UnexpectedResponse { .. })
    }

    /// Check if the remote side failed.
    pub fn is_remote_error(&self) -> bool {
        matches!(self, SyncError::Remote { .. })
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
