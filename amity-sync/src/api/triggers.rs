//! Manual sync triggers
//!
//! Backfill queues history for a fresh connection; run pushes the pending
//! outbox to the peer and applies whatever the peer has pending for us.
//! Both are user-initiated and synchronous.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use amity_common::db::models::Connection;

use crate::db::connections;
use crate::sync::peer::PeerClient;
use crate::sync::{outbox, receiver};
use crate::{
    api::{require_user, ApiError},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub connection_id: String,
}

#[derive(Debug, Serialize)]
pub struct BackfillResponse {
    pub people_queued: u64,
    pub moments_queued: u64,
}

/// POST /api/sync/backfill
///
/// Queues every syncable person and non-deleted moment for push,
/// regardless of link state. Re-running is safe: entities already queued
/// or sent are skipped, so the counts reflect newly queued work only.
pub async fn backfill(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<BackfillResponse>, ApiError> {
    require_user(&headers)?;
    let connection = require_active_connection(&state, &request.connection_id).await?;

    let counts = outbox::backfill(&state.db, &connection.id).await?;

    info!(
        "Backfill on connection {}: {} people, {} moments queued",
        connection.id, counts.people_queued, counts.moments_queued
    );

    Ok(Json(BackfillResponse {
        people_queued: counts.people_queued,
        moments_queued: counts.moments_queued,
    }))
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub pushed: usize,
    pub push_conflicts: usize,
    pub pulled: usize,
    pub applied: usize,
    pub pull_conflicts: usize,
}

/// POST /api/sync/run
///
/// One full exchange: push the pending outbox, then pull and apply the
/// peer's pending events. The outbox is only marked sent after the peer
/// acknowledges the push, so a failed push leaves everything queued.
pub async fn run_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    require_user(&headers)?;
    let connection = require_active_connection(&state, &request.connection_id).await?;

    let client = PeerClient::new(state.http.clone(), connection.peer_url.clone());

    let pending = outbox::collect_pending(&state.db, &connection.id).await?;
    let pushed = pending.len();
    let mut push_conflicts = 0usize;

    if !pending.is_empty() {
        let ack = client
            .push_events(&connection, &pending)
            .await
            .map_err(|e| ApiError::Peer(e.to_string()))?;
        push_conflicts = ack.conflicts.len();
        outbox::mark_all_sent(&state.db, &connection.id).await?;
    }

    let pulled = client
        .pull_events(&connection)
        .await
        .map_err(|e| ApiError::Peer(e.to_string()))?;

    let applied = receiver::apply_events(&state.db, &connection, &pulled.events).await?;

    info!(
        "Sync run on connection {}: pushed {}, pulled {}, applied {}",
        connection.id,
        pushed,
        pulled.events.len(),
        applied.applied
    );

    Ok(Json(RunResponse {
        pushed,
        push_conflicts,
        pulled: pulled.events.len(),
        applied: applied.applied,
        pull_conflicts: applied.conflicts.len(),
    }))
}

async fn require_active_connection(
    state: &AppState,
    connection_id: &str,
) -> Result<Connection, ApiError> {
    connections::get_connection(&state.db, connection_id)
        .await?
        .filter(Connection::is_active)
        .ok_or_else(|| ApiError::NotFound("connection not found or revoked".to_string()))
}
