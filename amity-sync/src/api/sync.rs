//! Peer-to-peer sync endpoints
//!
//! All handlers here sit behind the HMAC middleware, which attaches the
//! authenticated Connection as a request extension.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use tracing::info;

use amity_common::api::types::{
    PeopleEntry, PeopleResponse, PullResponse, PushRequest, PushResponse,
};
use amity_common::db::models::Connection;

use crate::db::{connections, people};
use crate::sync::{outbox, receiver};
use crate::{api::ApiError, AppState};

/// POST /api/sync/push
///
/// Applies a batch of inbound events. An empty batch responds success with
/// zero applied and no side effects.
pub async fn receive_push(
    State(state): State<AppState>,
    Extension(connection): Extension<Connection>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>, ApiError> {
    let response = receiver::apply_events(&state.db, &connection, &request.events).await?;
    Ok(Json(response))
}

/// POST /api/sync/pull
///
/// Drains this side's pending outbox into a batch of events for the
/// calling peer. Rows are marked sent once handed over.
pub async fn pull_pending(
    State(state): State<AppState>,
    Extension(connection): Extension<Connection>,
) -> Result<Json<PullResponse>, ApiError> {
    let events = outbox::collect_pending(&state.db, &connection.id).await?;
    outbox::mark_all_sent(&state.db, &connection.id).await?;

    info!(
        "Handed {} pending events to peer over connection {}",
        events.len(),
        connection.id
    );

    Ok(Json(PullResponse { events }))
}

/// GET /api/sync/people
///
/// This side's syncable people, for the peer's remote-people cache.
pub async fn list_people(
    State(state): State<AppState>,
    Extension(_connection): Extension<Connection>,
) -> Result<Json<PeopleResponse>, ApiError> {
    let people = people::list_syncable(&state.db)
        .await?
        .into_iter()
        .map(|p| PeopleEntry {
            person_uid: p.person_uid,
            name: p.name,
            relationship_label: p.relationship_label,
        })
        .collect();

    Ok(Json(PeopleResponse {
        people,
        fetched_at: Utc::now(),
    }))
}

/// POST /api/sync/revoked
///
/// Peer-initiated revocation notice; reflects the change without polling.
pub async fn connection_revoked(
    State(state): State<AppState>,
    Extension(connection): Extension<Connection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    connections::revoke_connection(&state.db, &connection.id).await?;
    info!("Connection {} revoked by peer", connection.id);
    Ok(Json(serde_json::json!({ "revoked": true })))
}
