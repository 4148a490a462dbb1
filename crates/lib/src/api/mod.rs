//! HTTP surface over a [`RecordService`].
//!
//! ```text
//! POST   /api/auth/login                 {token}            → Identity
//! POST   /api/auth/logout
//! GET    /api/auth/current-user                             → Identity
//! GET    /api/records/{partition}                           → {id: Record}
//! POST   /api/records/{partition}        RecordInput        → Record
//! PUT    /api/records/{partition}/{id}   RecordInput        → Record
//! DELETE /api/records/{partition}?ids=a,b                   → {count}
//! POST   /api/records/{partition}/import [Record]           → {count}
//! GET    /api/records/{partition}/tags                      → [tag]
//! POST   /api/archive                    {applicationIds}   → {count}
//! GET    /health
//! ```
//!
//! The session id travels only in the [`SESSION_COOKIE`] cookie.

pub mod envelope;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_cookies::{
    Cookie, CookieManagerLayer, Cookies,
    cookie::{SameSite, time},
};
use tracing::info;

use self::envelope::{ApiError, ArchiveRequest, Count, HealthResponse, LoginRequest, Success};
use crate::{
    auth::Identity,
    constants::SESSION_COOKIE,
    service::{Principal, RecordService},
    store::{Partition, Record, RecordInput, RecordMap},
};

type ApiResult<T> = std::result::Result<Success<T>, ApiError>;

#[derive(Clone)]
struct AppState {
    service: Arc<RecordService>,
}

/// Build the router. Cookie handling is layered in.
pub fn router(service: Arc<RecordService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/auth/current-user", get(handle_current_user))
        .route(
            "/api/records/{partition}",
            get(handle_list).post(handle_create).delete(handle_delete),
        )
        .route("/api/records/{partition}/import", post(handle_import))
        .route("/api/records/{partition}/tags", get(handle_tags))
        .route("/api/records/{partition}/{id}", put(handle_update))
        .route("/api/archive", post(handle_archive))
        .layer(CookieManagerLayer::new())
        .with_state(AppState { service })
}

// ============================================================================
// Cookies and sessions
// ============================================================================

fn session_cookie(service: &RecordService, session_id: String) -> Cookie<'static> {
    let max_age = i64::try_from(service.session_lifetime().as_secs()).unwrap_or(i64::MAX);
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id);
    cookie.set_http_only(true);
    cookie.set_secure(service.secure_cookies());
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(max_age));
    cookie
}

fn session_id(cookies: &Cookies) -> String {
    cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default()
}

/// Resolve the request's session, re-issuing the cookie when its expiry slid.
async fn authorize(state: &AppState, cookies: &Cookies) -> Result<Principal, ApiError> {
    let id = session_id(cookies);
    let principal = state.service.authorize(&id).await.inspect_err(|e| {
        if e.is_authentication_error() {
            remove_session_cookie(cookies);
        }
    })?;
    if principal.refreshed() {
        cookies.add(session_cookie(&state.service, id));
    }
    Ok(principal)
}

fn remove_session_cookie(cookies: &Cookies) {
    if cookies.get(SESSION_COOKIE).is_some() {
        let mut cookie = Cookie::from(SESSION_COOKIE);
        cookie.set_path("/");
        cookies.remove(cookie);
    }
}

fn partition(raw: &str) -> Result<Partition, ApiError> {
    Ok(raw.parse::<Partition>()?)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_login(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Identity> {
    let request = body(payload)?;
    let session = state.service.login(&request.token).await?;
    cookies.add(session_cookie(&state.service, session.id));
    Ok(Success::new("Logged in", session.identity))
}

async fn handle_logout(State(state): State<AppState>, cookies: Cookies) -> ApiResult<()> {
    let id = session_id(&cookies);
    state.service.logout(&id).await?;
    remove_session_cookie(&cookies);
    info!("logged out");
    Ok(Success::message("Logged out"))
}

async fn handle_current_user(
    State(state): State<AppState>,
    cookies: Cookies,
) -> ApiResult<Identity> {
    let principal = authorize(&state, &cookies).await?;
    Ok(Success::new("Current user", principal.identity().clone()))
}

async fn handle_list(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(raw): Path<String>,
) -> ApiResult<RecordMap> {
    let partition = partition(&raw)?;
    let principal = authorize(&state, &cookies).await?;
    let records = state.service.records(&principal, partition).await?;
    Ok(Success::new("Records", records))
}

async fn handle_create(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(raw): Path<String>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> ApiResult<Record> {
    let partition = partition(&raw)?;
    let principal = authorize(&state, &cookies).await?;
    let input = body(payload)?;
    let record = state
        .service
        .create_record(&principal, partition, input)
        .await?;
    Ok(Success::new("Record created", record))
}

async fn handle_update(
    State(state): State<AppState>,
    cookies: Cookies,
    Path((raw, id)): Path<(String, String)>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> ApiResult<Record> {
    let partition = partition(&raw)?;
    let principal = authorize(&state, &cookies).await?;
    let input = body(payload)?;
    let record = state
        .service
        .update_record(&principal, partition, &id, input)
        .await?;
    Ok(Success::new("Record updated", record))
}

#[derive(Deserialize)]
struct IdsQuery {
    #[serde(default)]
    ids: String,
}

impl IdsQuery {
    fn ids(&self) -> Vec<String> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

async fn handle_delete(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(raw): Path<String>,
    Query(query): Query<IdsQuery>,
) -> ApiResult<Count> {
    let partition = partition(&raw)?;
    let principal = authorize(&state, &cookies).await?;
    let count = state
        .service
        .delete_records(&principal, partition, &query.ids())
        .await?;
    Ok(Success::new(format!("Deleted {count} records"), Count { count }))
}

async fn handle_import(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(raw): Path<String>,
    payload: Result<Json<Vec<Record>>, JsonRejection>,
) -> ApiResult<Count> {
    let partition = partition(&raw)?;
    let principal = authorize(&state, &cookies).await?;
    let records = body(payload)?;
    let count = state
        .service
        .bulk_import(&principal, partition, records)
        .await?;
    Ok(Success::new(format!("Imported {count} records"), Count { count }))
}

async fn handle_tags(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(raw): Path<String>,
) -> ApiResult<Vec<String>> {
    let partition = partition(&raw)?;
    let principal = authorize(&state, &cookies).await?;
    let tags = state.service.tags(&principal, partition).await?;
    Ok(Success::new("Tags", tags))
}

async fn handle_archive(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: Result<Json<ArchiveRequest>, JsonRejection>,
) -> ApiResult<Count> {
    let principal = authorize(&state, &cookies).await?;
    let request = body(payload)?;
    let count = state
        .service
        .archive(&principal, &request.application_ids)
        .await?;
    Ok(Success::new(format!("Archived {count} records"), Count { count }))
}
