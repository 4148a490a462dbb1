//! Identity assertions and their verification.
//!
//! An assertion is a compact signed token,
//! `b64url(header).b64url(claims).b64url(signature)`, signed with Ed25519
//! (`alg = "EdDSA"`). The header's `kid` selects the verifying key from a
//! [`KeySet`]; the claims carry issuer, audience, expiry and the user's
//! profile, which becomes the session's [`Identity`].

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use super::errors::AuthError;
use crate::{Clock, Result, config::IdentityConfig, constants::KEY_SET_REFETCH_INTERVAL};

/// The only signature algorithm accepted in assertion headers.
pub const ASSERTION_ALGORITHM: &str = "EdDSA";

/// Size of Ed25519 public keys in bytes
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of Ed25519 signatures in bytes
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// A verified user. `username` is the verified e-mail address and is the key
/// every record blob is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

/// Claims carried by an identity assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    #[serde(default)]
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// Issued-at, seconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            username: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Verifies an external identity proof.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Check `proof` and return the identity it asserts.
    async fn verify(&self, proof: &str) -> Result<Identity>;
}

/// Verifying keys indexed by key id.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: HashMap<String, VerifyingKey>,
}

/// Wire form of a key set: `{"keys":[{"kid":"...","x":"<base64url key>"}]}`.
#[derive(Serialize, Deserialize)]
struct KeySetDocument {
    keys: Vec<KeyEntry>,
}

#[derive(Serialize, Deserialize)]
struct KeyEntry {
    kid: String,
    x: String,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, kid: impl Into<String>, key: VerifyingKey) -> Self {
        self.insert(kid, key);
        self
    }

    pub fn insert(&mut self, kid: impl Into<String>, key: VerifyingKey) {
        self.keys.insert(kid.into(), key);
    }

    pub fn get(&self, kid: &str) -> Option<&VerifyingKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parse the JSON key-set document.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: KeySetDocument =
            serde_json::from_str(json).map_err(|e| AuthError::KeySetFetch {
                reason: format!("invalid key set document: {e}"),
            })?;
        Ok(Self::try_from(document)?)
    }

    /// Render the JSON key-set document.
    pub fn to_json(&self) -> Result<String> {
        let mut keys: Vec<KeyEntry> = self
            .keys
            .iter()
            .map(|(kid, key)| KeyEntry {
                kid: kid.clone(),
                x: Base64UrlUnpadded::encode_string(key.as_bytes()),
            })
            .collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        Ok(serde_json::to_string(&KeySetDocument { keys })?)
    }
}

impl TryFrom<KeySetDocument> for KeySet {
    type Error = AuthError;

    fn try_from(document: KeySetDocument) -> std::result::Result<Self, AuthError> {
        let mut set = KeySet::new();
        for entry in document.keys {
            let bytes = Base64UrlUnpadded::decode_vec(&entry.x).map_err(|e| {
                AuthError::KeySetFetch {
                    reason: format!("key '{}' is not base64url: {e}", entry.kid),
                }
            })?;
            let bytes: [u8; ED25519_PUBLIC_KEY_SIZE] =
                bytes.try_into().map_err(|v: Vec<u8>| AuthError::KeySetFetch {
                    reason: format!(
                        "key '{}' must be {ED25519_PUBLIC_KEY_SIZE} bytes, got {}",
                        entry.kid,
                        v.len()
                    ),
                })?;
            let key = VerifyingKey::from_bytes(&bytes).map_err(|e| AuthError::KeySetFetch {
                reason: format!("key '{}' is not a valid Ed25519 key: {e}", entry.kid),
            })?;
            set.insert(entry.kid, key);
        }
        Ok(set)
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kids: Vec<&String> = self.keys.keys().collect();
        kids.sort();
        f.debug_struct("KeySet").field("kids", &kids).finish()
    }
}

enum KeySource {
    Static(KeySet),
    Remote {
        url: Url,
        client: reqwest::Client,
        cache: RwLock<CachedKeys>,
    },
}

#[derive(Default)]
struct CachedKeys {
    keys: KeySet,
    /// Clock millis of the last successful fetch.
    fetched_at: Option<u64>,
}

/// [`IdentityVerifier`] for Ed25519-signed compact assertions.
pub struct SignedAssertionVerifier {
    issuer: String,
    audience: String,
    keys: KeySource,
    clock: Arc<dyn Clock>,
}

impl SignedAssertionVerifier {
    /// Verifier with a fixed key set.
    pub fn with_keys(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        keys: KeySet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            keys: KeySource::Static(keys),
            clock,
        }
    }

    /// Verifier that fetches its key set from `url`, each fetch bounded by
    /// `fetch_timeout`. The set is cached and refetched when an assertion names
    /// an unknown key, at most once per [`KEY_SET_REFETCH_INTERVAL`].
    pub fn with_key_set_url(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        url: Url,
        fetch_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| AuthError::KeySetFetch {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            issuer: issuer.into(),
            audience: audience.into(),
            keys: KeySource::Remote {
                url,
                client,
                cache: RwLock::new(CachedKeys::default()),
            },
            clock,
        })
    }

    /// Build from configuration: a key-set URL wins over static keys.
    pub fn from_config(
        config: &IdentityConfig,
        fetch_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        match &config.key_set_url {
            Some(url) => Self::with_key_set_url(
                &config.issuer,
                &config.audience,
                url.clone(),
                fetch_timeout,
                clock,
            ),
            None => Ok(Self::with_keys(
                &config.issuer,
                &config.audience,
                config.static_keys.clone(),
                clock,
            )),
        }
    }

    async fn key_for(&self, kid: &str) -> Result<VerifyingKey> {
        match &self.keys {
            KeySource::Static(keys) => keys.get(kid).cloned().ok_or_else(|| {
                AuthError::UnknownKey {
                    kid: kid.to_string(),
                }
                .into()
            }),
            KeySource::Remote { url, client, cache } => {
                if let Some(key) = cache.read().await.keys.get(kid).cloned() {
                    return Ok(key);
                }
                let mut cached = cache.write().await;
                // Another verification may have refreshed the set while this one waited.
                if let Some(key) = cached.keys.get(kid).cloned() {
                    return Ok(key);
                }
                let now = self.clock.now_millis();
                let interval = KEY_SET_REFETCH_INTERVAL.as_millis() as u64;
                if let Some(at) = cached.fetched_at
                    && now.saturating_sub(at) < interval
                {
                    debug!(kid, "unknown key, key set fetched recently");
                    return Err(AuthError::UnknownKey {
                        kid: kid.to_string(),
                    }
                    .into());
                }
                debug!(kid, %url, "key not cached, fetching key set");
                let fresh = fetch_key_set(client, url).await?;
                info!(keys = fresh.len(), "refreshed identity key set");
                cached.keys = fresh;
                cached.fetched_at = Some(now);
                cached.keys.get(kid).cloned().ok_or_else(|| {
                    AuthError::UnknownKey {
                        kid: kid.to_string(),
                    }
                    .into()
                })
            }
        }
    }

    fn check_claims(&self, claims: &Claims) -> std::result::Result<(), AuthError> {
        if claims.iss != self.issuer {
            return Err(AuthError::IssuerMismatch {
                expected: self.issuer.clone(),
                actual: claims.iss.clone(),
            });
        }
        if claims.aud != self.audience {
            return Err(AuthError::AudienceMismatch {
                expected: self.audience.clone(),
                actual: claims.aud.clone(),
            });
        }
        if claims.exp <= self.clock.now_secs() {
            return Err(AuthError::Expired {
                expired_at: claims.exp,
            });
        }
        if claims.email.trim().is_empty() {
            return Err(AuthError::invalid("assertion carries no e-mail"));
        }
        Ok(())
    }
}

impl fmt::Debug for SignedAssertionVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = match &self.keys {
            KeySource::Static(keys) => format!("{keys:?}"),
            KeySource::Remote { url, .. } => url.to_string(),
        };
        f.debug_struct("SignedAssertionVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("keys", &keys)
            .finish()
    }
}

#[async_trait]
impl IdentityVerifier for SignedAssertionVerifier {
    async fn verify(&self, proof: &str) -> Result<Identity> {
        let mut segments = proof.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::invalid("expected three dot-separated segments").into());
        };

        let header: Header = decode_segment(header_b64, "header")?;
        if header.alg != ASSERTION_ALGORITHM {
            return Err(AuthError::invalid(format!("unsupported algorithm '{}'", header.alg)).into());
        }
        let key = self.key_for(&header.kid).await?;

        let signature = Base64UrlUnpadded::decode_vec(signature_b64)
            .map_err(|e| AuthError::invalid(format!("signature is not base64url: {e}")))?;
        let signature: [u8; ED25519_SIGNATURE_SIZE] =
            signature.as_slice().try_into().map_err(|_| {
                AuthError::invalid(format!(
                    "signature must be {ED25519_SIGNATURE_SIZE} bytes"
                ))
            })?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        key.verify(signing_input.as_bytes(), &Signature::from_bytes(&signature))
            .map_err(|_| AuthError::invalid("signature does not verify"))?;

        let claims: Claims = decode_segment(claims_b64, "claims")?;
        self.check_claims(&claims)?;
        Ok(claims.identity())
    }
}

async fn fetch_key_set(client: &reqwest::Client, url: &Url) -> Result<KeySet> {
    let fetch_error = |e: reqwest::Error| AuthError::KeySetFetch {
        reason: e.to_string(),
    };
    let document: KeySetDocument = client
        .get(url.clone())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_error)?
        .json()
        .await
        .map_err(fetch_error)?;
    Ok(KeySet::try_from(document)?)
}

fn decode_segment<T: DeserializeOwned>(
    segment: &str,
    what: &str,
) -> std::result::Result<T, AuthError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment)
        .map_err(|e| AuthError::invalid(format!("{what} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::invalid(format!("{what} is malformed: {e}")))
}

/// Issue a signed assertion for `claims` under key id `kid`.
pub fn encode_assertion(signing_key: &SigningKey, kid: &str, claims: &Claims) -> Result<String> {
    let header = Header {
        alg: ASSERTION_ALGORITHM.to_string(),
        kid: kid.to_string(),
        typ: Some("JWT".to_string()),
    };
    let header_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&header)?);
    let claims_b64 = Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        Base64UrlUnpadded::encode_string(&signature.to_bytes())
    ))
}
