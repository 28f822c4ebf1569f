//! Authentication middleware for peer-to-peer endpoints
//!
//! Validates the HMAC signature over the exact raw request body against
//! the connection's shared secret. The three rejection causes - missing
//! headers, unknown/inactive connection, signature mismatch - return
//! textually distinct messages but are all opaque 401s; callers must treat
//! them as equivalent.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use amity_common::api::auth::{verify_signature, CONNECTION_HEADER, SIGNATURE_HEADER};
use amity_common::db::init::setting_i64;

use crate::db::connections;
use crate::AppState;

/// Fallback body size cap when the setting row is absent, matching the
/// seeded default for `http_max_body_size_bytes`
const DEFAULT_MAX_BODY_BYTES: i64 = 1024 * 1024;

/// HMAC authentication middleware for /api/sync/* peer routes.
///
/// On success the resolved Connection is attached as a request extension
/// and the body is restored for downstream handlers.
pub async fn sync_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, SyncAuthError> {
    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(SyncAuthError::MissingHeaders)?;

    let connection_id = request
        .headers()
        .get(CONNECTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(SyncAuthError::MissingHeaders)?;

    let connection = connections::get_connection(&state.db, &connection_id)
        .await
        .map_err(|e| SyncAuthError::Internal(e.to_string()))?
        .filter(|c| c.is_active())
        .ok_or(SyncAuthError::UnknownConnection)?;

    let max_body = setting_i64(&state.db, "http_max_body_size_bytes", DEFAULT_MAX_BODY_BYTES)
        .await
        .map_err(|e| SyncAuthError::Internal(e.to_string()))?;
    let max_body = usize::try_from(max_body).unwrap_or(DEFAULT_MAX_BODY_BYTES as usize);

    // Verify over the exact byte sequence received
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, max_body)
        .await
        .map_err(|_| SyncAuthError::BodyTooLarge)?;

    if !verify_signature(&connection.shared_secret, &body_bytes, &signature) {
        warn!("Signature mismatch for connection {}", connection_id);
        return Err(SyncAuthError::InvalidSignature);
    }

    // Reconstruct request with restored body for downstream handlers
    let mut request = Request::from_parts(parts, Body::from(body_bytes));
    request.extensions_mut().insert(connection);

    Ok(next.run(request).await)
}

/// Authentication error types for HTTP responses
#[derive(Debug)]
pub enum SyncAuthError {
    MissingHeaders,
    UnknownConnection,
    InvalidSignature,
    BodyTooLarge,
    Internal(String),
}

impl IntoResponse for SyncAuthError {
    fn into_response(self) -> Response {
        // All auth failures are 401; internals are not leaked beyond the
        // message text
        let (status, message) = match self {
            SyncAuthError::MissingHeaders => {
                (StatusCode::UNAUTHORIZED, "missing sync headers".to_string())
            }
            SyncAuthError::UnknownConnection => {
                (StatusCode::UNAUTHORIZED, "unknown or inactive connection".to_string())
            }
            SyncAuthError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "invalid signature".to_string())
            }
            SyncAuthError::BodyTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "request body too large".to_string(),
            ),
            SyncAuthError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
