//! Remote people listing endpoint

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use amity_common::api::types::PeopleEntry;
use amity_common::db::init::setting_i64;
use amity_common::db::models::Connection;

use crate::db::{connections, remote_cache};
use crate::sync::peer::PeerClient;
use crate::{
    api::{require_user, ApiError},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct RemotePeopleRequest {
    pub connection_id: String,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct RemotePeopleResponse {
    pub people: Vec<PeopleEntry>,
    /// Surfaced to the user as "last fetched"
    pub fetched_at: chrono::DateTime<Utc>,
    pub from_cache: bool,
}

/// POST /api/people/remote
///
/// Returns the peer's people listing, served from the cache while it is
/// within its TTL unless the caller forces a refresh. A refresh replaces
/// the cache wholesale; a failed refresh leaves the previous cache intact
/// and surfaces the peer error.
pub async fn remote_people(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RemotePeopleRequest>,
) -> Result<Json<RemotePeopleResponse>, ApiError> {
    require_user(&headers)?;

    let connection = connections::get_connection(&state.db, &request.connection_id)
        .await?
        .filter(Connection::is_active)
        .ok_or_else(|| ApiError::NotFound("connection not found or revoked".to_string()))?;

    let ttl = setting_i64(&state.db, "remote_people_cache_ttl_seconds", 300).await?;

    if !request.force_refresh {
        if let Some(fetched_at) = remote_cache::last_fetched_at(&state.db, &connection.id).await? {
            let age = Utc::now().signed_duration_since(fetched_at).num_seconds();
            if age < ttl {
                let people = cached_entries(&state, &connection.id).await?;
                return Ok(Json(RemotePeopleResponse {
                    people,
                    fetched_at,
                    from_cache: true,
                }));
            }
        }
    }

    let client = PeerClient::new(state.http.clone(), connection.peer_url.clone());
    let listing = client
        .list_people(&connection)
        .await
        .map_err(|e| ApiError::Peer(e.to_string()))?;

    let fetched_at = Utc::now();
    remote_cache::replace(&state.db, &connection.id, &listing.people, fetched_at).await?;

    info!(
        "Refreshed remote people cache for connection {}: {} entries",
        connection.id,
        listing.people.len()
    );

    Ok(Json(RemotePeopleResponse {
        people: listing.people,
        fetched_at,
        from_cache: false,
    }))
}

async fn cached_entries(state: &AppState, connection_id: &str) -> Result<Vec<PeopleEntry>, ApiError> {
    let people = remote_cache::load(&state.db, connection_id)
        .await?
        .into_iter()
        .map(|r| PeopleEntry {
            person_uid: r.person_uid,
            name: r.name,
            relationship_label: r.relationship_label,
        })
        .collect();
    Ok(people)
}
