//! Database initialization
//!
//! Creates the sync schema on first run and keeps it idempotent: every
//! statement is `CREATE ... IF NOT EXISTS` so startup is safe to repeat.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode: concurrent readers with one writer, needed because push
    // receiver writes can overlap mapping reads
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_settings_table(&pool).await?;
    create_connections_table(&pool).await?;
    create_pairing_codes_table(&pool).await?;
    create_people_table(&pool).await?;
    create_remote_people_table(&pool).await?;
    create_person_links_table(&pool).await?;
    create_person_candidates_table(&pool).await?;
    create_conflicts_table(&pool).await?;
    create_moments_table(&pool).await?;
    create_sync_outbox_table(&pool).await?;

    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the connections table
///
/// A connection is a trust relationship with one peer deployment, keyed by
/// a shared secret established during the pairing handshake. The raw secret
/// is stored (hex) because inbound push signatures must be recomputed with
/// the key itself.
async fn create_connections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS connections (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            remote_system TEXT NOT NULL,
            peer_url TEXT NOT NULL,
            shared_secret TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'revoked')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_connections_user ON connections(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the pairing_codes table
///
/// One-time short-lived codes; consumed_at marks single use.
async fn create_pairing_codes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pairing_codes (
            code TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TIMESTAMP NOT NULL,
            consumed_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the people table
///
/// Local person profiles. `person_uid` is the stable cross-system
/// identifier; `merged_into_person_id` marks superseded records.
pub async fn create_people_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS people (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            person_uid TEXT NOT NULL UNIQUE,
            relationship_label TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            merged_into_person_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_people_uid ON people(person_uid)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_people_user ON people(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the remote_people cache table
///
/// Read-through cache of the peer's people listing; derived data, never
/// authoritative.
async fn create_remote_people_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS remote_people (
            connection_id TEXT NOT NULL REFERENCES connections(id) ON DELETE CASCADE,
            person_uid TEXT NOT NULL,
            name TEXT NOT NULL,
            relationship_label TEXT,
            fetched_at TIMESTAMP NOT NULL,
            PRIMARY KEY (connection_id, person_uid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the person_links table
///
/// Durable identity mapping between local people and remote person uids.
/// The partial unique indexes are the storage-level invariant: at most one
/// non-excluded row per (connection, remote uid), at most one linked row
/// per (connection, local person). The client-side reconciler check is
/// advisory until activation persists through these.
pub async fn create_person_links_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS person_links (
            id TEXT PRIMARY KEY,
            connection_id TEXT NOT NULL REFERENCES connections(id) ON DELETE CASCADE,
            local_person_id TEXT REFERENCES people(id) ON DELETE CASCADE,
            remote_person_uid TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('linked', 'excluded', 'conflict')),
            is_enabled INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_links_remote_unique
        ON person_links(connection_id, remote_person_uid)
        WHERE status != 'excluded'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_links_local_unique
        ON person_links(connection_id, local_person_id)
        WHERE status = 'linked' AND local_person_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_links_excluded_unique
        ON person_links(connection_id, remote_person_uid)
        WHERE status = 'excluded'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the person_candidates table
///
/// System-suggested pairings awaiting human confirmation, upserted by the
/// push receiver; keyed by (connection, remote uid).
async fn create_person_candidates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS person_candidates (
            id TEXT PRIMARY KEY,
            connection_id TEXT NOT NULL REFERENCES connections(id) ON DELETE CASCADE,
            remote_person_uid TEXT NOT NULL,
            local_person_id TEXT REFERENCES people(id) ON DELETE SET NULL,
            confidence REAL NOT NULL DEFAULT 0.0,
            reasons TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'resolved')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (connection_id, remote_person_uid),
            CHECK (confidence >= 0.0 AND confidence <= 1.0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the conflicts table
///
/// Append-only log of sync events that could not be applied automatically.
/// Never deleted by the engine; resolution is a user action elsewhere.
async fn create_conflicts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conflicts (
            id TEXT PRIMARY KEY,
            connection_id TEXT NOT NULL REFERENCES connections(id) ON DELETE CASCADE,
            entity_type TEXT NOT NULL CHECK (entity_type IN ('person', 'moment')),
            entity_uid TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('missing_mapping', 'duplicate_detected', 'update_conflict')),
            local_payload TEXT,
            remote_payload TEXT,
            suggested_resolution TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_conflicts_entity ON conflicts(connection_id, entity_type, entity_uid)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the moments table
///
/// Event/memory records. `moment_uid` is the cross-system identifier;
/// sync applies soft deletes only (deleted_at), never hard deletes.
pub async fn create_moments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS moments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            moment_uid TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            category TEXT,
            moment_date TEXT NOT NULL,
            partner_ids TEXT NOT NULL DEFAULT '[]',
            attachments TEXT NOT NULL DEFAULT '[]',
            source TEXT NOT NULL DEFAULT 'local' CHECK (source IN ('local', 'sync')),
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_moments_uid ON moments(moment_uid)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_moments_date ON moments(moment_date)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the sync_outbox table
///
/// Pending outbound work queued by backfill and mapping activation. The
/// unique index makes repeated backfills a no-op for already-queued rows.
async fn create_sync_outbox_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_outbox (
            id TEXT PRIMARY KEY,
            connection_id TEXT NOT NULL REFERENCES connections(id) ON DELETE CASCADE,
            entity_type TEXT NOT NULL CHECK (entity_type IN ('person', 'moment')),
            entity_uid TEXT NOT NULL,
            queued_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            sent_at TIMESTAMP,
            UNIQUE (connection_id, entity_type, entity_uid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_outbox_pending ON sync_outbox(connection_id, sent_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values; NULL values
/// are reset to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Pairing handshake settings
    ensure_setting(pool, "pairing_code_ttl_seconds", "600").await?;

    // Remote people cache settings
    ensure_setting(pool, "remote_people_cache_ttl_seconds", "300").await?;

    // HTTP settings
    ensure_setting(pool, "http_max_body_size_bytes", "1048576").await?;
    ensure_setting(pool, "peer_request_timeout_ms", "30000").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE handles concurrent initialization races
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

/// Read an integer setting, falling back to the supplied default
pub async fn setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .flatten();

    Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(default))
}
