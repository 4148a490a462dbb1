//! Health check command - checks a running jobvault server.

use std::time::Duration;

use jobvault::api::envelope::HealthResponse;
use url::Url;

use crate::cli::HealthArgs;

/// Run the health check command
pub async fn run(args: &HealthArgs) -> Result<(), Box<dyn std::error::Error>> {
    let url = health_url(&args.url)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| format!("unhealthy: failed to connect to {url}: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("unhealthy: {url} returned HTTP status {}", response.status()).into());
    }

    let health: HealthResponse = response.json().await?;
    if health.status != "ok" {
        return Err(format!("unhealthy: server reported status '{}'", health.status).into());
    }
    println!("healthy: jobvault {} at {url}", health.version);
    Ok(())
}

/// Accept either the server root or the full `/health` URL.
fn health_url(base: &Url) -> Result<Url, url::ParseError> {
    if base.path().trim_end_matches('/').ends_with("/health") {
        return Ok(base.clone());
    }
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        root.set_path(&format!("{}/", root.path()));
    }
    root.join("health")
}
