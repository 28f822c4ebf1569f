//! Local people queries

use amity_common::api::types::PersonPayload;
use amity_common::db::models::Person;
use amity_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

const PERSON_COLUMNS: &str = "id, user_id, name, person_uid, relationship_label, \
     archived, merged_into_person_id, updated_at";

/// Find a person by the stable cross-system uid
pub async fn find_by_uid(pool: &SqlitePool, person_uid: &str) -> Result<Option<Person>> {
    let person = sqlx::query_as::<_, Person>(&format!(
        "SELECT {PERSON_COLUMNS} FROM people WHERE person_uid = ?"
    ))
    .bind(person_uid)
    .fetch_optional(pool)
    .await?;

    Ok(person)
}

/// Case-insensitive exact name lookup among syncable people, used by the
/// push receiver's duplicate detection
pub async fn find_duplicate_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Person>> {
    let person = sqlx::query_as::<_, Person>(&format!(
        "SELECT {PERSON_COLUMNS} FROM people \
         WHERE LOWER(name) = LOWER(?) AND archived = 0 AND merged_into_person_id IS NULL \
         LIMIT 1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(person)
}

/// All syncable people (non-archived, not merged away)
pub async fn list_syncable(pool: &SqlitePool) -> Result<Vec<Person>> {
    let people = sqlx::query_as::<_, Person>(&format!(
        "SELECT {PERSON_COLUMNS} FROM people \
         WHERE archived = 0 AND merged_into_person_id IS NULL \
         ORDER BY name, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(people)
}

/// The stable cross-system uid for a local person id
pub async fn person_uid_for_id(pool: &SqlitePool, id: &str) -> Result<Option<String>> {
    let uid: Option<String> = sqlx::query_scalar("SELECT person_uid FROM people WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(uid)
}

/// Create a local person for a mapping `create_local` action.
///
/// The new record adopts the remote uid as its own person_uid so future
/// person upserts from the peer resolve directly.
pub async fn create_from_remote(
    pool: &SqlitePool,
    user_id: &str,
    remote_person_uid: &str,
    name: &str,
    relationship_label: Option<&str>,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO people (id, user_id, name, person_uid, relationship_label) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(name)
    .bind(remote_person_uid)
    .bind(relationship_label)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Apply a strictly-newer person payload over an existing record
pub async fn update_from_payload(pool: &SqlitePool, id: &str, payload: &PersonPayload) -> Result<()> {
    sqlx::query(
        "UPDATE people SET name = ?, relationship_label = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&payload.name)
    .bind(&payload.relationship_label)
    .bind(payload.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
