//! Storage backend creation.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use jobvault::backend::{InMemory, KvBackend, Sqlite};

use crate::cli::{Backend, ServeArgs};

const DATABASE_FILE: &str = "jobvault.db";
const RECORDS_FILE: &str = "records.json";
const SESSIONS_FILE: &str = "sessions.json";

/// The server's two key spaces: encrypted record blobs and plaintext sessions.
pub struct Storage {
    pub records: Arc<dyn KvBackend>,
    pub sessions: Arc<dyn KvBackend>,
    snapshots: Vec<(Arc<InMemory>, PathBuf)>,
}

impl Storage {
    /// Write out in-memory contents. A no-op for SQLite, which commits as it goes.
    pub async fn close(&self) {
        for (backend, path) in &self.snapshots {
            match backend.save_to_file(path).await {
                Ok(()) => tracing::info!("Saved {}", path.display()),
                Err(e) => {
                    tracing::error!("Failed to save {}: {e}", path.display());
                    eprintln!("Failed to save {}: {e}", path.display());
                }
            }
        }
    }
}

/// Create the storage selected by `args.backend` under the data directory.
pub async fn create_storage(args: &ServeArgs) -> Result<Storage, Box<dyn std::error::Error>> {
    let data_dir = args.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    match args.backend {
        Backend::Sqlite => {
            let db_path = data_dir.join(DATABASE_FILE);
            tracing::info!("Using SQLite backend at {}", db_path.display());
            let db = Sqlite::open(&db_path).await?;
            Ok(Storage {
                records: Arc::new(db.namespace("records")),
                sessions: Arc::new(db.namespace("sessions")),
                snapshots: Vec::new(),
            })
        }
        Backend::Inmemory => {
            tracing::warn!(
                "Using in-memory backend; data is written to {} only on graceful shutdown",
                data_dir.display()
            );
            let records_path = data_dir.join(RECORDS_FILE);
            let sessions_path = data_dir.join(SESSIONS_FILE);
            let records = load(&records_path).await?;
            let sessions = load(&sessions_path).await?;
            Ok(Storage {
                records: records.clone(),
                sessions: sessions.clone(),
                snapshots: vec![(records, records_path), (sessions, sessions_path)],
            })
        }
    }
}

async fn load(path: &Path) -> Result<Arc<InMemory>, Box<dyn std::error::Error>> {
    let backend = InMemory::load_from_file(path).await?;
    tracing::info!(keys = backend.len().await, "Loaded {}", path.display());
    Ok(Arc::new(backend))
}
