//! Remote people cache queries
//!
//! Read-through cache of the peer's people listing; refreshed via the peer
//! endpoint, never authoritative.

use amity_common::api::types::PeopleEntry;
use amity_common::db::models::RemotePerson;
use amity_common::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Load cached rows for a connection
pub async fn load(pool: &SqlitePool, connection_id: &str) -> Result<Vec<RemotePerson>> {
    let rows = sqlx::query_as::<_, RemotePerson>(
        "SELECT connection_id, person_uid, name, relationship_label, fetched_at \
         FROM remote_people WHERE connection_id = ? ORDER BY name, person_uid",
    )
    .bind(connection_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Timestamp of the last refresh, if any rows are cached
pub async fn last_fetched_at(
    pool: &SqlitePool,
    connection_id: &str,
) -> Result<Option<DateTime<Utc>>> {
    let fetched: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT MAX(fetched_at) FROM remote_people WHERE connection_id = ?",
    )
    .bind(connection_id)
    .fetch_optional(pool)
    .await?
    .flatten();

    Ok(fetched)
}

/// Replace the cache with a fresh listing
pub async fn replace(
    pool: &SqlitePool,
    connection_id: &str,
    people: &[PeopleEntry],
    fetched_at: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM remote_people WHERE connection_id = ?")
        .bind(connection_id)
        .execute(&mut *tx)
        .await?;

    for person in people {
        sqlx::query(
            "INSERT INTO remote_people (connection_id, person_uid, name, relationship_label, fetched_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(connection_id)
        .bind(&person.person_uid)
        .bind(&person.name)
        .bind(&person.relationship_label)
        .bind(fetched_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
