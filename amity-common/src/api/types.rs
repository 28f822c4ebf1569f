//! Wire types for the server-to-server sync protocol

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity kinds carried by sync events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Moment,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Moment => "moment",
        }
    }
}

/// Event operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upsert,
    Delete,
}

/// One sync event; the payload shape depends on entity_type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub entity_type: EntityType,
    pub entity_uid: String,
    pub operation: Operation,
    pub payload: Value,
}

/// Person payload inside a `person` upsert event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonPayload {
    pub person_uid: String,
    pub name: String,
    #[serde(default)]
    pub relationship_label: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Moment payload inside a `moment` upsert event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentPayload {
    pub moment_uid: String,
    /// Remote person uid the moment belongs to; resolved through the
    /// committed enabled link on the receiving side
    pub person_uid: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Remote timestamp the local moment_date is derived from
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Value>,
    pub updated_at: DateTime<Utc>,
}

/// Push request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub events: Vec<SyncEvent>,
}

/// One conflict entry in a push response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub entity_uid: String,
    pub entity_type: EntityType,
    pub reason: String,
}

/// Push response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub applied: usize,
    pub conflicts: Vec<ConflictReport>,
}

/// Pull response body: pending events drained from the peer's outbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    pub events: Vec<SyncEvent>,
}

/// One entry in the peer's people listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeopleEntry {
    pub person_uid: String,
    pub name: String,
    #[serde(default)]
    pub relationship_label: Option<String>,
}

/// People listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeopleResponse {
    pub people: Vec<PeopleEntry>,
    pub fetched_at: DateTime<Utc>,
}

/// Idempotent mapping activation actions, derived from the staged/committed
/// diff - never from re-deriving full desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingAction {
    Link {
        local_person_id: String,
        remote_person_uid: String,
    },
    CreateRemote {
        local_person_id: String,
    },
    CreateLocal {
        remote_person_uid: String,
        remote_name: String,
        #[serde(default)]
        remote_relationship_label: Option<String>,
    },
    Exclude {
        remote_person_uid: String,
    },
}

/// Mapping activation request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateRequest {
    pub connection_id: String,
    pub actions: Vec<MappingAction>,
}

/// Mapping activation response: per-action counts, no batch atomicity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateResponse {
    pub succeeded: usize,
    pub failed: usize,
}

/// Pairing accept request (peer to generator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingAcceptRequest {
    pub code: String,
    pub system_name: String,
    pub base_url: String,
    pub user_id: String,
}

/// Pairing accept response; the raw secret crosses the wire exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingAcceptResponse {
    pub connection_id: String,
    pub secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_action_serializes_as_tagged_union() {
        let action = MappingAction::CreateLocal {
            remote_person_uid: "r-1".into(),
            remote_name: "Alex".into(),
            remote_relationship_label: Some("friend".into()),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "create_local");
        assert_eq!(json["remote_person_uid"], "r-1");

        let back: MappingAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn event_entity_types_use_snake_case() {
        let event = SyncEvent {
            entity_type: EntityType::Moment,
            entity_uid: "m-1".into(),
            operation: Operation::Delete,
            payload: serde_json::json!({}),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["entity_type"], "moment");
        assert_eq!(json["operation"], "delete");
    }
}
