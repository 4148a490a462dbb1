//! Authentication error types.
//!
//! Every variant maps to an `AuthenticationError` at the service boundary. The
//! variants exist so logs and tests can tell a forged assertion from an
//! unreachable key set.

use std::time::Duration;

use thiserror::Error as ThisError;

/// Errors that can occur while verifying identities or resolving sessions.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum AuthError {
    /// The assertion is malformed or its signature does not verify.
    #[error("Invalid identity assertion: {reason}")]
    InvalidAssertion {
        /// Description of why the assertion was rejected
        reason: String,
    },

    /// The assertion names a signing key that is not in the key set.
    #[error("Unknown signing key: {kid}")]
    UnknownKey {
        /// Key id from the assertion header
        kid: String,
    },

    /// The assertion was issued by someone other than the configured issuer.
    #[error("Issuer mismatch: expected '{expected}', got '{actual}'")]
    IssuerMismatch {
        /// Configured issuer
        expected: String,
        /// Issuer claimed by the assertion
        actual: String,
    },

    /// The assertion was issued for a different audience.
    #[error("Audience mismatch: expected '{expected}', got '{actual}'")]
    AudienceMismatch {
        /// Configured audience
        expected: String,
        /// Audience claimed by the assertion
        actual: String,
    },

    /// The assertion's `exp` is not in the future.
    #[error("Identity assertion expired at {expired_at}")]
    Expired {
        /// Expiry claimed by the assertion, seconds since epoch
        expired_at: i64,
    },

    /// Verification did not finish within the configured bound.
    #[error("Identity verification timed out after {timeout:?}")]
    VerificationTimedOut {
        /// The bound that elapsed
        timeout: Duration,
    },

    /// The remote key set could not be fetched or parsed.
    #[error("Failed to fetch key set: {reason}")]
    KeySetFetch {
        /// Description of the failure
        reason: String,
    },

    /// The request carries no valid session.
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Shorthand for an [`AuthError::InvalidAssertion`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        AuthError::InvalidAssertion {
            reason: reason.into(),
        }
    }

    /// Check if the request simply had no usable session.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, AuthError::NotAuthenticated)
    }

    /// Check if verification failed for lack of time or an unreachable key set,
    /// rather than because the assertion itself was bad.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            AuthError::VerificationTimedOut { .. } | AuthError::KeySetFetch { .. }
        )
    }

    /// Check if the assertion itself was rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidAssertion { .. }
                | AuthError::UnknownKey { .. }
                | AuthError::IssuerMismatch { .. }
                | AuthError::AudienceMismatch { .. }
                | AuthError::Expired { .. }
        )
    }
}

impl From<AuthError> for crate::Error {
    fn from(err: AuthError) -> Self {
        crate::Error::Auth(err)
    }
}
