//! Conflict log and candidate queries
//!
//! Conflicts are append-only; the engine never deletes them. Candidates
//! are upserted per (connection, remote uid) so repeated pushes refresh
//! rather than duplicate.

use amity_common::api::types::EntityType;
use amity_common::Result;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Append a conflict record
#[allow(clippy::too_many_arguments)]
pub async fn insert_conflict(
    pool: &SqlitePool,
    connection_id: &str,
    entity_type: EntityType,
    entity_uid: &str,
    kind: &str,
    local_payload: Option<&Value>,
    remote_payload: Option<&Value>,
    suggested_resolution: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO conflicts \
         (id, connection_id, entity_type, entity_uid, kind, local_payload, remote_payload, suggested_resolution) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(connection_id)
    .bind(entity_type.as_str())
    .bind(entity_uid)
    .bind(kind)
    .bind(local_payload.map(|v| v.to_string()))
    .bind(remote_payload.map(|v| v.to_string()))
    .bind(suggested_resolution)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert a person candidate for user confirmation
pub async fn upsert_candidate(
    pool: &SqlitePool,
    connection_id: &str,
    remote_person_uid: &str,
    local_person_id: Option<&str>,
    confidence: f64,
    reasons: &[&str],
) -> Result<()> {
    let reasons_json = serde_json::to_string(reasons)
        .map_err(|e| amity_common::Error::Internal(e.to_string()))?;

    sqlx::query(
        "INSERT INTO person_candidates \
         (id, connection_id, remote_person_uid, local_person_id, confidence, reasons, status) \
         VALUES (?, ?, ?, ?, ?, ?, 'pending') \
         ON CONFLICT (connection_id, remote_person_uid) DO UPDATE SET \
           local_person_id = excluded.local_person_id, \
           confidence = excluded.confidence, \
           reasons = excluded.reasons, \
           updated_at = CURRENT_TIMESTAMP",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(connection_id)
    .bind(remote_person_uid)
    .bind(local_person_id)
    .bind(confidence)
    .bind(reasons_json)
    .execute(pool)
    .await?;

    Ok(())
}
