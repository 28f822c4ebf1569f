//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trust relationship with one peer deployment
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Connection {
    pub id: String,
    pub user_id: String,
    pub remote_system: String,
    pub peer_url: String,
    pub shared_secret: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Local person profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Person {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub person_uid: String,
    pub relationship_label: Option<String>,
    pub archived: bool,
    pub merged_into_person_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Cached row from the peer's people listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RemotePerson {
    pub connection_id: String,
    pub person_uid: String,
    pub name: String,
    pub relationship_label: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Link status values for person_links rows
pub mod link_status {
    pub const LINKED: &str = "linked";
    pub const EXCLUDED: &str = "excluded";
    pub const CONFLICT: &str = "conflict";
}

/// Conflict kind values
pub mod conflict_kind {
    pub const MISSING_MAPPING: &str = "missing_mapping";
    pub const DUPLICATE_DETECTED: &str = "duplicate_detected";
    pub const UPDATE_CONFLICT: &str = "update_conflict";
}

/// Event/memory record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Moment {
    pub id: String,
    pub user_id: String,
    pub moment_uid: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub moment_date: String,
    pub partner_ids: String,
    pub attachments: String,
    pub source: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
