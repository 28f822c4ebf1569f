//! HTTP API handlers for amity-sync

pub mod auth;
pub mod health;
pub mod mapping;
pub mod pairing;
pub mod people;
pub mod sync;
pub mod triggers;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Header the session layer uses to inject the acting user's id
pub const USER_HEADER: &str = "x-amity-user-id";

/// Handler error type mapped onto HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// Authentication/session failures; always a generic rejection
    Unauthorized(String),
    /// Malformed input, surfaced with a specific actionable message
    BadRequest(String),
    NotFound(String),
    /// Peer-system call failed; caller may retry
    Peer(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Peer(msg) => (StatusCode::BAD_GATEWAY, format!("{} - try again", msg)),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<amity_common::Error> for ApiError {
    fn from(e: amity_common::Error) -> Self {
        match e {
            amity_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            amity_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            amity_common::Error::Peer(msg) => ApiError::Peer(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Read the acting user id injected by the session layer
pub fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("missing session".to_string()))
}
