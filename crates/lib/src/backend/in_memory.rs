//! In-memory key-value backend with optional JSON file persistence.
//!
//! Serves both as the server's storage medium (saved to disk on shutdown) and
//! as device storage for a Local Replica.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

use super::{KvBackend, errors::BackendError};
use crate::{Error, Result};

/// The current persistence file format version.
const PERSISTENCE_VERSION: u8 = 0;

fn is_v0(v: &u8) -> bool {
    *v == 0
}

fn validate_persistence_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != PERSISTENCE_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported persistence version {version}; only version {PERSISTENCE_VERSION} is supported"
        )));
    }
    Ok(version)
}

/// On-disk layout of an [`InMemory`] backend.
#[derive(Serialize, Deserialize)]
struct SerializableBackend {
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_persistence_version"
    )]
    version: u8,
    #[serde(default)]
    values: HashMap<String, String>,
}

/// A `HashMap`-backed [`KvBackend`].
#[derive(Debug, Default)]
pub struct InMemory {
    values: RwLock<HashMap<String, String>>,
}

impl InMemory {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the full contents to `path` as JSON.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let values = self.values.read().await.clone();
        let serializable = SerializableBackend {
            version: PERSISTENCE_VERSION,
            values,
        };

        let json = serde_json::to_string_pretty(&serializable)
            .map_err(|e| -> Error { BackendError::SerializationFailed { source: e }.into() })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| -> Error { BackendError::FileIo { source: e }.into() })
    }

    /// Loads a backend previously written by [`InMemory::save_to_file`].
    ///
    /// A missing file yields an empty backend.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let serializable: SerializableBackend =
                    serde_json::from_str(&json).map_err(|e| -> Error {
                        BackendError::DeserializationFailed { source: e }.into()
                    })?;
                Ok(Self {
                    values: RwLock::new(serializable.values),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(BackendError::FileIo { source: e }.into()),
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Whether the backend holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl KvBackend for InMemory {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn put_if_present(&self, key: &str, value: String) -> Result<bool> {
        let mut values = self.values.write().await;
        match values.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.values.read().await.keys().cloned().collect())
    }
}
