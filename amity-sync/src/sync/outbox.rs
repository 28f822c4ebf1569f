//! Outbound sync queue
//!
//! Backfill enqueues existing local records; activation enqueues people for
//! create_remote. The UNIQUE(connection_id, entity_type, entity_uid) index
//! is the dedup: re-queueing a pending row is a no-op, so repeated
//! backfills report zero newly queued.

use amity_common::api::types::{EntityType, MomentPayload, Operation, PersonPayload, SyncEvent};
use amity_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::links;

/// Counts of newly queued rows from one backfill pass
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BackfillCounts {
    pub people_queued: u64,
    pub moments_queued: u64,
}

/// Queue every syncable person and non-deleted moment for outbound push.
///
/// Only newly inserted rows are counted; anything already pending is left
/// untouched.
pub async fn backfill(pool: &SqlitePool, connection_id: &str) -> Result<BackfillCounts> {
    let people = sqlx::query(
        "INSERT OR IGNORE INTO sync_outbox (id, connection_id, entity_type, entity_uid) \
         SELECT lower(hex(randomblob(16))), ?, 'person', person_uid \
         FROM people WHERE archived = 0 AND merged_into_person_id IS NULL",
    )
    .bind(connection_id)
    .execute(pool)
    .await?;

    let moments = sqlx::query(
        "INSERT OR IGNORE INTO sync_outbox (id, connection_id, entity_type, entity_uid) \
         SELECT lower(hex(randomblob(16))), ?, 'moment', moment_uid \
         FROM moments WHERE deleted_at IS NULL",
    )
    .bind(connection_id)
    .execute(pool)
    .await?;

    Ok(BackfillCounts {
        people_queued: people.rows_affected(),
        moments_queued: moments.rows_affected(),
    })
}

/// Queue a single person for outbound push (mapping create_remote)
pub async fn enqueue_person(
    pool: &SqlitePool,
    connection_id: &str,
    person_uid: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO sync_outbox (id, connection_id, entity_type, entity_uid) \
         VALUES (lower(hex(randomblob(16))), ?, 'person', ?)",
    )
    .bind(connection_id)
    .bind(person_uid)
    .execute(pool)
    .await?;

    Ok(())
}

/// Build events for every pending outbox row, from current entity state.
///
/// Payloads are constructed at send time, not enqueue time, so a row edited
/// after queueing ships its latest state.
pub async fn collect_pending(pool: &SqlitePool, connection_id: &str) -> Result<Vec<SyncEvent>> {
    let pending = sqlx::query_as::<_, (String, String)>(
        "SELECT entity_type, entity_uid FROM sync_outbox \
         WHERE connection_id = ? AND sent_at IS NULL ORDER BY queued_at, id",
    )
    .bind(connection_id)
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(pending.len());
    for (entity_type, entity_uid) in pending {
        let event = match entity_type.as_str() {
            "person" => build_person_event(pool, &entity_uid).await?,
            "moment" => build_moment_event(pool, connection_id, &entity_uid).await?,
            _ => None,
        };
        if let Some(event) = event {
            events.push(event);
        }
    }

    Ok(events)
}

/// Mark every currently pending row sent after a successful push
pub async fn mark_all_sent(pool: &SqlitePool, connection_id: &str) -> Result<()> {
    sqlx::query(
        "UPDATE sync_outbox SET sent_at = CURRENT_TIMESTAMP \
         WHERE connection_id = ? AND sent_at IS NULL",
    )
    .bind(connection_id)
    .execute(pool)
    .await?;

    Ok(())
}

async fn build_person_event(pool: &SqlitePool, person_uid: &str) -> Result<Option<SyncEvent>> {
    let Some(person) = crate::db::people::find_by_uid(pool, person_uid).await? else {
        return Ok(None);
    };

    let payload = PersonPayload {
        person_uid: person.person_uid.clone(),
        name: person.name,
        relationship_label: person.relationship_label,
        updated_at: person.updated_at,
    };

    Ok(Some(SyncEvent {
        entity_type: EntityType::Person,
        entity_uid: person.person_uid,
        operation: Operation::Upsert,
        payload: serde_json::to_value(payload)
            .map_err(|e| amity_common::Error::Internal(e.to_string()))?,
    }))
}

async fn build_moment_event(
    pool: &SqlitePool,
    connection_id: &str,
    moment_uid: &str,
) -> Result<Option<SyncEvent>> {
    let Some(moment) = crate::db::moments::find_by_uid(pool, moment_uid).await? else {
        return Ok(None);
    };

    // Soft-deleted rows ship as deletes
    if moment.deleted_at.is_some() {
        return Ok(Some(SyncEvent {
            entity_type: EntityType::Moment,
            entity_uid: moment.moment_uid,
            operation: Operation::Delete,
            payload: serde_json::json!({}),
        }));
    }

    let partner_ids: Vec<String> = serde_json::from_str(&moment.partner_ids).unwrap_or_default();

    // The peer addresses people by the uid recorded in the committed link;
    // fall back to the person's own stable uid for never-linked people
    let person_uid = match partner_ids.first() {
        Some(local_id) => match links::remote_uid_for_local(pool, connection_id, local_id).await? {
            Some(remote_uid) => remote_uid,
            None => match crate::db::people::person_uid_for_id(pool, local_id).await? {
                Some(uid) => uid,
                None => return Ok(None),
            },
        },
        None => return Ok(None),
    };

    let occurred_at = format!("{}T00:00:00Z", moment.moment_date)
        .parse()
        .unwrap_or(moment.updated_at);

    let payload = MomentPayload {
        moment_uid: moment.moment_uid.clone(),
        person_uid,
        title: moment.title,
        description: moment.description,
        category: moment.category,
        occurred_at,
        attachments: serde_json::from_str(&moment.attachments).unwrap_or_default(),
        updated_at: moment.updated_at,
    };

    Ok(Some(SyncEvent {
        entity_type: EntityType::Moment,
        entity_uid: moment.moment_uid,
        operation: Operation::Upsert,
        payload: serde_json::to_value(payload)
            .map_err(|e| amity_common::Error::Internal(e.to_string()))?,
    }))
}
