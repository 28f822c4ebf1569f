//! Moment queries

use amity_common::api::types::MomentPayload;
use amity_common::db::models::Moment;
use amity_common::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const MOMENT_COLUMNS: &str = "id, user_id, moment_uid, title, description, category, \
     moment_date, partner_ids, attachments, source, deleted_at, updated_at";

/// Find a moment by the cross-system uid
pub async fn find_by_uid(pool: &SqlitePool, moment_uid: &str) -> Result<Option<Moment>> {
    let moment = sqlx::query_as::<_, Moment>(&format!(
        "SELECT {MOMENT_COLUMNS} FROM moments WHERE moment_uid = ?"
    ))
    .bind(moment_uid)
    .fetch_optional(pool)
    .await?;

    Ok(moment)
}

/// Insert a remotely-sourced moment, tagged `source = 'sync'`.
///
/// The local moment_date is derived from the remote occurred-at timestamp;
/// attachments pass through untouched.
pub async fn insert_synced(
    pool: &SqlitePool,
    user_id: &str,
    local_person_id: &str,
    payload: &MomentPayload,
) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    let partner_ids = serde_json::to_string(&[local_person_id])
        .map_err(|e| amity_common::Error::Internal(e.to_string()))?;
    let attachments = serde_json::to_string(&payload.attachments)
        .map_err(|e| amity_common::Error::Internal(e.to_string()))?;

    sqlx::query(
        "INSERT INTO moments \
         (id, user_id, moment_uid, title, description, category, moment_date, \
          partner_ids, attachments, source, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'sync', ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(&payload.moment_uid)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.category)
    .bind(payload.occurred_at.date_naive().to_string())
    .bind(partner_ids)
    .bind(attachments)
    .bind(payload.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite an existing moment with a newer remote payload
pub async fn update_from_payload(
    pool: &SqlitePool,
    id: &str,
    local_person_id: &str,
    payload: &MomentPayload,
) -> Result<()> {
    let partner_ids = serde_json::to_string(&[local_person_id])
        .map_err(|e| amity_common::Error::Internal(e.to_string()))?;
    let attachments = serde_json::to_string(&payload.attachments)
        .map_err(|e| amity_common::Error::Internal(e.to_string()))?;

    sqlx::query(
        "UPDATE moments SET title = ?, description = ?, category = ?, moment_date = ?, \
         partner_ids = ?, attachments = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.category)
    .bind(payload.occurred_at.date_naive().to_string())
    .bind(partner_ids)
    .bind(attachments)
    .bind(payload.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Soft-delete by uid. Absent records are a no-op; sync never hard-deletes.
pub async fn soft_delete_by_uid(pool: &SqlitePool, moment_uid: &str) -> Result<()> {
    sqlx::query("UPDATE moments SET deleted_at = ? WHERE moment_uid = ? AND deleted_at IS NULL")
        .bind(Utc::now())
        .bind(moment_uid)
        .execute(pool)
        .await?;

    Ok(())
}
