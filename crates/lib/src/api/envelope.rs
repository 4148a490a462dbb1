//! JSON response envelope shared by the server and [`RemoteClient`](crate::sync::RemoteClient).
//!
//! Success: `{"success": true, "msg": "...", "data": ...}`.
//! Failure: `{"success": false, "detail": "...", "kind": "...", "field": "..."}`,
//! where `kind` names the error class and `field` the rejected input field.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{Error, store::StoreError};

#[derive(Debug, Serialize, Deserialize)]
pub struct Success<T> {
    pub success: bool,
    pub msg: String,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Success<T> {
    pub fn new(msg: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            msg: msg.into(),
            data: Some(data),
        }
    }
}

impl Success<()> {
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: msg.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Failure {
    pub success: bool,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Machine-readable class of a failure, so a client can tell a corrupted
/// store from other server errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Unauthenticated,
    NotFound,
    PausedOffline,
    Corrupted,
    Decryption,
    Internal,
}

impl FailureKind {
    pub fn of(err: &Error) -> Self {
        if err.is_validation_error() {
            FailureKind::Validation
        } else if err.is_authentication_error() {
            FailureKind::Unauthenticated
        } else if err.is_not_found() {
            FailureKind::NotFound
        } else if err.is_paused_offline() {
            FailureKind::PausedOffline
        } else if err.is_corrupted() {
            FailureKind::Corrupted
        } else if err.is_decryption_error() {
            FailureKind::Decryption
        } else {
            FailureKind::Internal
        }
    }

    /// HTTP status a failure of this kind is sent with.
    pub fn status(self) -> StatusCode {
        match self {
            FailureKind::Validation => StatusCode::BAD_REQUEST,
            FailureKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            FailureKind::NotFound => StatusCode::NOT_FOUND,
            FailureKind::PausedOffline => StatusCode::SERVICE_UNAVAILABLE,
            FailureKind::Corrupted | FailureKind::Decryption | FailureKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Payload of operations that report how many records they touched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Count {
    pub count: usize,
}

/// Body of `POST /api/archive`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    pub application_ids: Vec<String>,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub token: String,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A library error rendered as a failure envelope.
#[derive(Debug)]
pub struct ApiError {
    kind: FailureKind,
    detail: String,
    field: Option<String>,
}

impl ApiError {
    /// A request body or query the handler could not parse.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Validation,
            detail: detail.into(),
            field: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let kind = FailureKind::of(&err);
        let field = match &err {
            Error::Store(StoreError::Validation { field, .. }) => Some(field.clone()),
            _ => None,
        };
        let detail = match kind {
            FailureKind::Corrupted | FailureKind::Decryption => {
                error!(module = err.module(), error = %err, "request failed");
                "user data corrupted".to_string()
            }
            FailureKind::Internal => {
                error!(module = err.module(), error = %err, "request failed");
                "internal error".to_string()
            }
            _ => {
                warn!(status = kind.status().as_u16(), error = %err, "request rejected");
                err.to_string()
            }
        };
        Self {
            kind,
            detail,
            field,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.kind.status(),
            Json(Failure {
                success: false,
                detail: self.detail,
                kind: Some(self.kind),
                field: self.field,
            }),
        )
            .into_response()
    }
}
