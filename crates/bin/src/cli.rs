//! CLI argument definitions for the jobvault binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// SQLite database; every write is committed immediately (default)
    Sqlite,
    /// In-memory with JSON files written on shutdown (for development)
    Inmemory,
}

/// jobvault job application tracker server
#[derive(Parser, Debug)]
#[command(name = "jobvault")]
#[command(about = "jobvault: encrypted job application tracker server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the jobvault API server
    Serve(ServeArgs),
    /// Check health of a running jobvault server
    Health(HealthArgs),
}

/// Arguments for the serve command
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "JOBVAULT_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "JOBVAULT_HOST")]
    pub host: String,

    /// Storage backend to use
    #[arg(short, long, default_value = "sqlite", env = "JOBVAULT_BACKEND")]
    pub backend: Backend,

    /// Data directory for storage files.
    /// For SQLite: stores jobvault.db
    /// For InMemory: stores records.json and sessions.json
    #[arg(short = 'D', long, env = "JOBVAULT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Secret the record encryption key is derived from
    #[arg(long, env = "JOBVAULT_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Salt for the key derivation; changing it makes existing data unreadable
    #[arg(long, env = "JOBVAULT_KDF_SALT")]
    pub kdf_salt: String,

    /// Expected issuer of identity assertions
    #[arg(long, env = "JOBVAULT_ISSUER")]
    pub issuer: String,

    /// Expected audience of identity assertions
    #[arg(long, default_value = jobvault::constants::DEFAULT_AUDIENCE, env = "JOBVAULT_AUDIENCE")]
    pub audience: String,

    /// URL of the issuer's key-set document
    #[arg(long, env = "JOBVAULT_KEYS_URL", conflicts_with = "keys")]
    pub keys_url: Option<Url>,

    /// Path to a key-set document with the issuer's verifying keys
    #[arg(long, env = "JOBVAULT_KEYS")]
    pub keys: Option<PathBuf>,

    /// Session lifetime in hours
    #[arg(long, default_value_t = 168, env = "JOBVAULT_SESSION_HOURS")]
    pub session_hours: u64,

    /// Refresh sessions with less than this many hours remaining
    #[arg(long, default_value_t = 144, env = "JOBVAULT_REFRESH_HOURS")]
    pub refresh_hours: u64,

    /// Bound on identity verification, in seconds
    #[arg(long, default_value_t = 10)]
    pub verify_timeout: u64,

    /// Issue session cookies without the Secure attribute (plain-HTTP development only)
    #[arg(long, env = "JOBVAULT_INSECURE_COOKIES")]
    pub insecure_cookies: bool,
}

/// Arguments for the health command
#[derive(clap::Args, Debug)]
pub struct HealthArgs {
    /// Base URL of the server to check
    #[arg(long, default_value = "http://127.0.0.1:3000", env = "JOBVAULT_URL")]
    pub url: Url,

    /// Timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}
