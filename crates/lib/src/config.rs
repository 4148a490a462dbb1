//! Service configuration.
//!
//! The binary fills these from CLI flags and environment variables; tests
//! build them directly.

use std::{fmt, time::Duration};

use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use crate::{
    Result,
    auth::KeySet,
    constants::{
        DEFAULT_AUDIENCE, DEFAULT_REFRESH_THRESHOLD, DEFAULT_SESSION_LIFETIME,
        DEFAULT_VERIFY_TIMEOUT,
    },
};

/// Minimum salt length accepted for key derivation.
pub use crate::store::MIN_SALT_LENGTH;

/// A configuration value was rejected.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::Error {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
    .into()
}

/// Session lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a session lives after it is minted or refreshed.
    pub lifetime: Duration,
    /// A session with less than this remaining is extended on use.
    pub refresh_threshold: Duration,
    /// Bound on one identity verification.
    pub verify_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_SESSION_LIFETIME,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lifetime.is_zero() {
            return Err(invalid("session.lifetime", "must be greater than zero"));
        }
        if self.refresh_threshold > self.lifetime {
            return Err(invalid(
                "session.refresh_threshold",
                format!(
                    "{:?} exceeds the session lifetime {:?}",
                    self.refresh_threshold, self.lifetime
                ),
            ));
        }
        if self.verify_timeout.is_zero() {
            return Err(invalid("session.verify_timeout", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Which assertions are accepted at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
    /// Remote key-set document; takes precedence over `static_keys`.
    pub key_set_url: Option<Url>,
    pub static_keys: KeySet,
}

impl IdentityConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: DEFAULT_AUDIENCE.to_string(),
            key_set_url: None,
            static_keys: KeySet::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(invalid("identity.issuer", "must not be empty"));
        }
        if self.audience.trim().is_empty() {
            return Err(invalid("identity.audience", "must not be empty"));
        }
        if self.key_set_url.is_none() && self.static_keys.is_empty() {
            return Err(invalid(
                "identity",
                "either a key set URL or at least one static key is required",
            ));
        }
        Ok(())
    }
}

/// Everything a [`RecordService`](crate::service::RecordService) needs.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Secret the blob encryption key is derived from.
    pub encryption_secret: Zeroizing<String>,
    /// Salt for key derivation; at least [`MIN_SALT_LENGTH`] bytes.
    pub kdf_salt: String,
    pub session: SessionConfig,
    pub identity: IdentityConfig,
    /// Mark the session cookie `Secure`. Disable only for plain-HTTP development.
    pub secure_cookies: bool,
}

impl ServiceConfig {
    pub fn new(
        encryption_secret: impl Into<String>,
        kdf_salt: impl Into<String>,
        identity: IdentityConfig,
    ) -> Self {
        Self {
            encryption_secret: Zeroizing::new(encryption_secret.into()),
            kdf_salt: kdf_salt.into(),
            session: SessionConfig::default(),
            identity,
            secure_cookies: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.encryption_secret.is_empty() {
            return Err(invalid("encryption_secret", "must not be empty"));
        }
        if self.kdf_salt.len() < MIN_SALT_LENGTH {
            return Err(invalid(
                "kdf_salt",
                format!("must be at least {MIN_SALT_LENGTH} bytes"),
            ));
        }
        self.session.validate()?;
        self.identity.validate()
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("encryption_secret", &"<redacted>")
            .field("kdf_salt", &self.kdf_salt)
            .field("session", &self.session)
            .field("identity", &self.identity)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}
