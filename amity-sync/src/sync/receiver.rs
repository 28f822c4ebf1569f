//! Inbound event application
//!
//! The core of the push receiver, shared by the push endpoint and the
//! pull-and-apply trigger. Events apply independently: one failure never
//! aborts the batch, and every non-applied event is captured as a conflict
//! entry in the response. Concurrency safety is optimistic last-write-wins
//! on `updated_at` - ties favor the stored record.

use amity_common::api::types::{
    ConflictReport, EntityType, MomentPayload, Operation, PersonPayload, PushResponse, SyncEvent,
};
use amity_common::db::models::{conflict_kind, Connection};
use amity_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{conflicts, links, moments, people};
use crate::mapping::match_names;

/// Outcome of applying a single event
enum Outcome {
    Applied,
    Conflict(String),
}

/// Apply a batch of inbound events for an authenticated connection.
///
/// An empty batch is an idempotent no-op: zero applied, no side effects.
pub async fn apply_events(
    pool: &SqlitePool,
    connection: &Connection,
    events: &[SyncEvent],
) -> Result<PushResponse> {
    let mut applied = 0usize;
    let mut conflict_reports = Vec::new();

    for event in events {
        let outcome = apply_one(pool, connection, event).await;

        match outcome {
            Ok(Outcome::Applied) => applied += 1,
            Ok(Outcome::Conflict(reason)) => {
                conflict_reports.push(ConflictReport {
                    entity_uid: event.entity_uid.clone(),
                    entity_type: event.entity_type,
                    reason,
                });
            }
            Err(e) => {
                // Capture the failure for this event and keep going
                warn!(
                    "Failed to apply {} {} event for {}: {}",
                    event.entity_type.as_str(),
                    match event.operation {
                        Operation::Upsert => "upsert",
                        Operation::Delete => "delete",
                    },
                    event.entity_uid,
                    e
                );
                conflict_reports.push(ConflictReport {
                    entity_uid: event.entity_uid.clone(),
                    entity_type: event.entity_type,
                    reason: format!("apply failed: {}", e),
                });
            }
        }
    }

    info!(
        "Applied {}/{} events for connection {} ({} conflicts)",
        applied,
        events.len(),
        connection.id,
        conflict_reports.len()
    );

    Ok(PushResponse {
        applied,
        conflicts: conflict_reports,
    })
}

async fn apply_one(
    pool: &SqlitePool,
    connection: &Connection,
    event: &SyncEvent,
) -> Result<Outcome> {
    match (event.entity_type, event.operation) {
        (EntityType::Person, Operation::Upsert) => person_upsert(pool, connection, event).await,
        // Remote deletions never delete local identity records; merges and
        // archival stay user-controlled
        (EntityType::Person, Operation::Delete) => Ok(Outcome::Applied),
        (EntityType::Moment, Operation::Upsert) => moment_upsert(pool, connection, event).await,
        (EntityType::Moment, Operation::Delete) => {
            moments::soft_delete_by_uid(pool, &event.entity_uid).await?;
            Ok(Outcome::Applied)
        }
    }
}

async fn person_upsert(
    pool: &SqlitePool,
    connection: &Connection,
    event: &SyncEvent,
) -> Result<Outcome> {
    let payload: PersonPayload = match serde_json::from_value(event.payload.clone()) {
        Ok(p) => p,
        Err(e) => return Ok(Outcome::Conflict(format!("invalid person payload: {}", e))),
    };

    if let Some(existing) = people::find_by_uid(pool, &payload.person_uid).await? {
        // Last-write-wins: update only on a strictly newer timestamp.
        // Stale or tied redeliveries are applied no-ops.
        if payload.updated_at > existing.updated_at {
            people::update_from_payload(pool, &existing.id, &payload).await?;
        }
        return Ok(Outcome::Applied);
    }

    // Unknown uid: creation always requires an explicit user action via
    // mapping activation, never an implicit push-time create.
    if let Some(duplicate) = people::find_duplicate_by_name(pool, &payload.name).await? {
        let local_snapshot = serde_json::to_value(&duplicate)
            .map_err(|e| amity_common::Error::Internal(e.to_string()))?;

        conflicts::insert_conflict(
            pool,
            &connection.id,
            EntityType::Person,
            &payload.person_uid,
            conflict_kind::DUPLICATE_DETECTED,
            Some(&local_snapshot),
            Some(&event.payload),
            &format!("link to existing person {}", duplicate.id),
        )
        .await?;

        // Disabled conflict link pending user resolution
        links::insert_conflict_link(pool, &connection.id, &duplicate.id, &payload.person_uid)
            .await?;

        let (confidence, reason) = match match_names(&duplicate.name, &payload.name) {
            Some(m) => (m.confidence, m.reason),
            None => (0.95, "Exact name match"),
        };
        conflicts::upsert_candidate(
            pool,
            &connection.id,
            &payload.person_uid,
            Some(&duplicate.id),
            confidence,
            &[reason],
        )
        .await?;

        return Ok(Outcome::Conflict(format!(
            "duplicate name matches local person {}",
            duplicate.id
        )));
    }

    conflicts::insert_conflict(
        pool,
        &connection.id,
        EntityType::Person,
        &payload.person_uid,
        conflict_kind::MISSING_MAPPING,
        None,
        Some(&event.payload),
        "create via mapping activation",
    )
    .await?;

    conflicts::upsert_candidate(pool, &connection.id, &payload.person_uid, None, 0.0, &[])
        .await?;

    Ok(Outcome::Conflict(
        "no mapping for remote person".to_string(),
    ))
}

async fn moment_upsert(
    pool: &SqlitePool,
    connection: &Connection,
    event: &SyncEvent,
) -> Result<Outcome> {
    let payload: MomentPayload = match serde_json::from_value(event.payload.clone()) {
        Ok(p) => p,
        Err(e) => return Ok(Outcome::Conflict(format!("invalid moment payload: {}", e))),
    };

    // A moment may only attach through a committed, enabled link - never
    // create an orphaned or mis-attributed record
    let Some(local_person_id) =
        links::resolve_enabled_link(pool, &connection.id, &payload.person_uid).await?
    else {
        conflicts::insert_conflict(
            pool,
            &connection.id,
            EntityType::Moment,
            &payload.moment_uid,
            conflict_kind::MISSING_MAPPING,
            None,
            Some(&event.payload),
            &format!("map remote person {} first", payload.person_uid),
        )
        .await?;
        return Ok(Outcome::Conflict(format!(
            "no enabled link for remote person {}",
            payload.person_uid
        )));
    };

    if let Some(existing) = moments::find_by_uid(pool, &payload.moment_uid).await? {
        if existing.updated_at > payload.updated_at {
            // Local copy is newer: keep it and log the collision
            let local_snapshot = serde_json::to_value(&existing)
                .map_err(|e| amity_common::Error::Internal(e.to_string()))?;
            conflicts::insert_conflict(
                pool,
                &connection.id,
                EntityType::Moment,
                &payload.moment_uid,
                conflict_kind::UPDATE_CONFLICT,
                Some(&local_snapshot),
                Some(&event.payload),
                "keep local (newer)",
            )
            .await?;
            return Ok(Outcome::Conflict("local record is newer".to_string()));
        }

        if payload.updated_at > existing.updated_at {
            moments::update_from_payload(pool, &existing.id, &local_person_id, &payload).await?;
        }
        // Equal timestamps favor the existing record: applied no-op
        return Ok(Outcome::Applied);
    }

    moments::insert_synced(pool, &connection.user_id, &local_person_id, &payload).await?;
    Ok(Outcome::Applied)
}
