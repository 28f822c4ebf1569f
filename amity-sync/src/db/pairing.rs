//! Pairing code queries

use amity_common::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

/// Store a freshly generated code with its expiry
pub async fn insert_code(
    pool: &SqlitePool,
    code: &str,
    user_id: &str,
    ttl_seconds: i64,
) -> Result<DateTime<Utc>> {
    let expires_at = Utc::now() + Duration::seconds(ttl_seconds);

    sqlx::query("INSERT INTO pairing_codes (code, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(code)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(expires_at)
}

/// Consume a code exactly once.
///
/// The single UPDATE is the atomicity guarantee: only an unconsumed,
/// unexpired row matches, so two racing accepts cannot both succeed.
/// Returns the generating user id, or None for invalid/expired/consumed -
/// callers must not distinguish which.
pub async fn consume_code(pool: &SqlitePool, code: &str) -> Result<Option<String>> {
    let now = Utc::now();

    let result = sqlx::query(
        "UPDATE pairing_codes SET consumed_at = ? \
         WHERE code = ? AND consumed_at IS NULL AND expires_at > ?",
    )
    .bind(now)
    .bind(code)
    .bind(now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let user_id: String = sqlx::query_scalar("SELECT user_id FROM pairing_codes WHERE code = ?")
        .bind(code)
        .fetch_one(pool)
        .await?;

    Ok(Some(user_id))
}
