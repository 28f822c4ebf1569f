//! Connection queries

use amity_common::db::models::Connection;
use amity_common::Result;
use sqlx::SqlitePool;

/// Load a connection by id
pub async fn get_connection(pool: &SqlitePool, id: &str) -> Result<Option<Connection>> {
    let connection = sqlx::query_as::<_, Connection>(
        "SELECT id, user_id, remote_system, peer_url, shared_secret, status, created_at \
         FROM connections WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(connection)
}

/// Insert a freshly established connection as active
pub async fn insert_connection(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    remote_system: &str,
    peer_url: &str,
    shared_secret: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO connections (id, user_id, remote_system, peer_url, shared_secret, status) \
         VALUES (?, ?, ?, ?, ?, 'active')",
    )
    .bind(id)
    .bind(user_id)
    .bind(remote_system)
    .bind(peer_url)
    .bind(shared_secret)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a connection revoked. Revoked is terminal - a new handshake is
/// required to resume syncing.
pub async fn revoke_connection(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE connections SET status = 'revoked' WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
