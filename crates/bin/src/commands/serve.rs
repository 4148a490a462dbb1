//! Serve command - runs the jobvault API server.

use std::{sync::Arc, time::Duration};

use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::EnvFilter;

use jobvault::{
    SystemClock, api,
    auth::KeySet,
    config::{IdentityConfig, ServiceConfig, SessionConfig},
    service::RecordService,
};

use crate::{backend::create_storage, cli::ServeArgs};

const HOUR: Duration = Duration::from_secs(3600);

/// Run the jobvault server
pub async fn run(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobvault=info".parse()?))
        .init();

    // Record blobs are ciphertext at rest; sessions are plaintext.
    let storage = create_storage(args).await?;

    let config = service_config(args).await?;
    let service = Arc::new(RecordService::new(
        &config,
        storage.records.clone(),
        storage.sessions.clone(),
        Arc::new(SystemClock),
    )?);
    let app = api::router(service);

    // Install handlers before binding so a failure surfaces at startup.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // Bind server
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    println!("jobvault listening on http://{local_addr}");
    println!();
    println!("Available endpoints:");
    println!("  POST   /api/auth/login                  - Exchange an identity assertion for a session");
    println!("  POST   /api/auth/logout                 - End the session");
    println!("  GET    /api/auth/current-user           - Identity behind the session");
    println!("  GET    /api/records/{{partition}}         - List records (active | archive)");
    println!("  POST   /api/records/{{partition}}         - Create a record");
    println!("  PUT    /api/records/{{partition}}/{{id}}    - Update a record");
    println!("  DELETE /api/records/{{partition}}?ids=... - Delete records");
    println!("  POST   /api/records/{{partition}}/import  - Last-write-wins bulk import");
    println!("  GET    /api/records/{{partition}}/tags    - Distinct tags");
    println!("  POST   /api/archive                     - Move records to the archive");
    println!("  GET    /health                          - Health check");
    println!();
    println!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown..."),
                _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown..."),
            }
        })
        .await?;

    storage.close().await;
    println!("Server shut down");
    Ok(())
}

async fn service_config(args: &ServeArgs) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let mut identity = IdentityConfig::new(&args.issuer);
    identity.audience = args.audience.clone();
    identity.key_set_url = args.keys_url.clone();
    if let Some(path) = &args.keys {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("failed to read key set {}: {e}", path.display()))?;
        identity.static_keys = KeySet::from_json(&json)?;
        tracing::info!(keys = identity.static_keys.len(), path = %path.display(), "loaded identity keys");
    }

    let mut config = ServiceConfig::new(args.secret.as_str(), &args.kdf_salt, identity);
    config.session = SessionConfig {
        lifetime: HOUR.saturating_mul(u32::try_from(args.session_hours)?),
        refresh_threshold: HOUR.saturating_mul(u32::try_from(args.refresh_hours)?),
        verify_timeout: Duration::from_secs(args.verify_timeout),
    };
    if args.insecure_cookies {
        tracing::warn!("session cookies will be issued without the Secure attribute");
        config.secure_cookies = false;
    }
    config.validate()?;
    Ok(config)
}
