//! Pairing handshake endpoints
//!
//! State machine per attempt: no_code -> code_generated ->
//! (code_accepted | code_expired). Codes are one-time and short-lived;
//! accept failures are deliberately indistinguishable (invalid, expired,
//! and consumed codes all produce the same message).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use amity_common::api::auth::{generate_pairing_code, generate_secret};
use amity_common::api::types::{PairingAcceptRequest, PairingAcceptResponse};
use amity_common::db::init::setting_i64;

use crate::db::{connections, pairing};
use crate::sync::peer::PeerClient;
use crate::{
    api::{require_user, ApiError},
    AppState,
};

/// Message for every failed accept; never reveals which check failed
const INVALID_CODE_MESSAGE: &str = "invalid or expired pairing code";

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/pairing/generate
///
/// Creates a short-lived code for the acting user; the UI renders a
/// countdown and clears the code client-side at expiry.
pub async fn generate_code(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GenerateResponse>, ApiError> {
    let user_id = require_user(&headers)?;

    let ttl = setting_i64(&state.db, "pairing_code_ttl_seconds", 600).await?;
    let code = generate_pairing_code();
    let expires_at = pairing::insert_code(&state.db, &code, &user_id, ttl).await?;

    info!("Generated pairing code for user {} (ttl {}s)", user_id, ttl);

    Ok(Json(GenerateResponse { code, expires_at }))
}

/// POST /api/pairing/accept
///
/// Called by the peer system with a code its user typed in. Consumes the
/// code exactly once and establishes an active connection with a fresh
/// shared secret; the raw secret is returned here and never again.
pub async fn accept_code(
    State(state): State<AppState>,
    Json(request): Json<PairingAcceptRequest>,
) -> Result<Json<PairingAcceptResponse>, ApiError> {
    let code = request.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::BadRequest("pairing code is required".to_string()));
    }

    let Some(user_id) = pairing::consume_code(&state.db, &code).await? else {
        return Err(ApiError::BadRequest(INVALID_CODE_MESSAGE.to_string()));
    };

    let connection_id = Uuid::new_v4().to_string();
    let secret = generate_secret();

    connections::insert_connection(
        &state.db,
        &connection_id,
        &user_id,
        &request.system_name,
        &request.base_url,
        &secret,
    )
    .await?;

    info!(
        "Pairing code accepted; connection {} established with {}",
        connection_id, request.system_name
    );

    Ok(Json(PairingAcceptResponse {
        connection_id,
        secret,
    }))
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub code: String,
    pub peer_url: String,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub connection_id: String,
}

/// POST /api/pairing/join
///
/// User-facing side of accepting: forwards the typed code to the peer's
/// accept endpoint and stores the resulting connection locally.
pub async fn join_peer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let user_id = require_user(&headers)?;

    if request.code.trim().is_empty() {
        return Err(ApiError::BadRequest("pairing code is required".to_string()));
    }
    if request.peer_url.trim().is_empty() {
        return Err(ApiError::BadRequest("peer URL is required".to_string()));
    }

    let client = PeerClient::new(state.http.clone(), request.peer_url.clone());
    let accepted = client
        .accept_pairing(&PairingAcceptRequest {
            code: request.code.trim().to_uppercase(),
            system_name: state.system_name.clone(),
            base_url: state.base_url.clone(),
            user_id: user_id.clone(),
        })
        .await
        .map_err(|e| ApiError::Peer(e.to_string()))?;

    connections::insert_connection(
        &state.db,
        &accepted.connection_id,
        &user_id,
        "temerio",
        request.peer_url.trim_end_matches('/'),
        &accepted.secret,
    )
    .await?;

    info!("Joined peer; connection {} active", accepted.connection_id);

    Ok(Json(JoinResponse {
        connection_id: accepted.connection_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub connection_id: String,
}

/// POST /api/pairing/revoke
///
/// Revokes locally and best-effort notifies the peer; absence of peer
/// acknowledgment still revokes here. Terminal - pairing again requires a
/// fresh handshake.
pub async fn revoke_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RevokeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_user(&headers)?;

    let Some(connection) = connections::get_connection(&state.db, &request.connection_id).await?
    else {
        return Err(ApiError::NotFound("connection not found".to_string()));
    };

    connections::revoke_connection(&state.db, &connection.id).await?;

    let client = PeerClient::new(state.http.clone(), connection.peer_url.clone());
    if let Err(e) = client.notify_revoked(&connection).await {
        warn!(
            "Peer not notified of revocation for connection {}: {}",
            connection.id, e
        );
    }

    info!("Connection {} revoked", connection.id);

    Ok(Json(serde_json::json!({ "revoked": true })))
}
