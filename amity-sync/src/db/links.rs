//! Person link queries
//!
//! person_links is the single source of truth for identity correspondence.
//! Writers go through the upserts here so the partial unique indexes stay
//! the enforcement point.

use amity_common::db::models::link_status;
use amity_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::mapping::CommittedState;

/// Load the committed mapping state for a connection
pub async fn committed_state(pool: &SqlitePool, connection_id: &str) -> Result<CommittedState> {
    let rows = sqlx::query_as::<_, (Option<String>, String, String)>(
        "SELECT local_person_id, remote_person_uid, status FROM person_links \
         WHERE connection_id = ?",
    )
    .bind(connection_id)
    .fetch_all(pool)
    .await?;

    let mut committed = CommittedState::default();
    for (local_person_id, remote_person_uid, status) in rows {
        match status.as_str() {
            link_status::LINKED => {
                if let Some(local_id) = local_person_id {
                    committed.links.insert(local_id, remote_person_uid);
                }
            }
            link_status::EXCLUDED => {
                committed.excluded.insert(remote_person_uid);
            }
            // conflict rows are pending human resolution; they are neither
            // committed links nor exclusions
            _ => {}
        }
    }

    Ok(committed)
}

/// Resolve the local person for a remote uid through the committed,
/// enabled link
pub async fn resolve_enabled_link(
    pool: &SqlitePool,
    connection_id: &str,
    remote_person_uid: &str,
) -> Result<Option<String>> {
    let local_id: Option<String> = sqlx::query_scalar(
        "SELECT local_person_id FROM person_links \
         WHERE connection_id = ? AND remote_person_uid = ? \
           AND status = ? AND is_enabled = 1 AND local_person_id IS NOT NULL",
    )
    .bind(connection_id)
    .bind(remote_person_uid)
    .bind(link_status::LINKED)
    .fetch_optional(pool)
    .await?;

    Ok(local_id)
}

/// The committed remote uid for a local person, if linked
pub async fn remote_uid_for_local(
    pool: &SqlitePool,
    connection_id: &str,
    local_person_id: &str,
) -> Result<Option<String>> {
    let remote_uid: Option<String> = sqlx::query_scalar(
        "SELECT remote_person_uid FROM person_links \
         WHERE connection_id = ? AND local_person_id = ? \
           AND status = ? AND is_enabled = 1",
    )
    .bind(connection_id)
    .bind(local_person_id)
    .bind(link_status::LINKED)
    .fetch_optional(pool)
    .await?;

    Ok(remote_uid)
}

/// Upsert a linked, enabled row for (local person, remote uid).
///
/// Clears competing rows for either side first so the action is idempotent
/// and re-runnable after partial batch failure. Every prior row for the
/// remote uid goes, including a stale exclusion: linking an excluded
/// remote un-excludes it, matching the staged-state transition.
pub async fn upsert_linked(
    pool: &SqlitePool,
    connection_id: &str,
    local_person_id: &str,
    remote_person_uid: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM person_links \
         WHERE connection_id = ? \
           AND (remote_person_uid = ? \
                OR (local_person_id = ? AND status != ?))",
    )
    .bind(connection_id)
    .bind(remote_person_uid)
    .bind(local_person_id)
    .bind(link_status::EXCLUDED)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO person_links \
         (id, connection_id, local_person_id, remote_person_uid, status, is_enabled) \
         VALUES (?, ?, ?, ?, ?, 1)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(connection_id)
    .bind(local_person_id)
    .bind(remote_person_uid)
    .bind(link_status::LINKED)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Upsert an excluded row for a remote uid
pub async fn upsert_excluded(
    pool: &SqlitePool,
    connection_id: &str,
    remote_person_uid: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO person_links \
         (id, connection_id, local_person_id, remote_person_uid, status, is_enabled) \
         VALUES (?, ?, NULL, ?, ?, 0) \
         ON CONFLICT DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(connection_id)
    .bind(remote_person_uid)
    .bind(link_status::EXCLUDED)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a disabled conflict link from duplicate detection, pending user
/// resolution. Idempotent: an existing non-excluded row for the uid wins.
pub async fn insert_conflict_link(
    pool: &SqlitePool,
    connection_id: &str,
    local_person_id: &str,
    remote_person_uid: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO person_links \
         (id, connection_id, local_person_id, remote_person_uid, status, is_enabled) \
         VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(connection_id)
    .bind(local_person_id)
    .bind(remote_person_uid)
    .bind(link_status::CONFLICT)
    .execute(pool)
    .await?;

    Ok(())
}
