//! Mapping state and activation endpoints
//!
//! GET rebuilds the staged mapping value object from source of truth;
//! POST applies an action batch derived from the client-side diff. Batches
//! are non-transactional: failures are counted, applied actions stand, and
//! callers reload committed state afterwards rather than trusting their
//! prior staged view.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use amity_common::api::types::{ActivateRequest, ActivateResponse, MappingAction};
use amity_common::db::models::Connection;

use crate::db::{connections, links, people, remote_cache};
use crate::mapping::reconcile::{LocalAction, Notice, RemoteAction};
use crate::mapping::{self, CommittedState, LocalInput, LocalTarget, MappingState, RemoteInput};
use crate::sync::outbox;
use crate::{
    api::{require_user, ApiError},
    AppState,
};

/// One local person's entry in the staged mapping view
#[derive(Debug, Serialize)]
pub struct LocalMappingView {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_person_uid: Option<String>,
}

/// The `{mapping, diff, suggestions}` value object consumed by the UI
#[derive(Debug, Serialize)]
pub struct MappingStateResponse {
    pub local_mappings: BTreeMap<String, LocalMappingView>,
    pub remote_excludes: Vec<String>,
    pub suggested: Vec<String>,
    pub has_changes: bool,
}

/// GET /api/mapping/:connection_id
pub async fn get_mapping_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(connection_id): Path<String>,
) -> Result<Json<MappingStateResponse>, ApiError> {
    require_user(&headers)?;
    require_active_connection(&state, &connection_id).await?;

    let (_, remotes, committed, staged) = build_staged(&state, &connection_id).await?;
    let has_changes = mapping::has_changes(&staged, &committed, &remotes);

    let local_mappings = staged
        .local
        .iter()
        .map(|(id, target)| {
            let view = match target {
                LocalTarget::Linked(uid) => LocalMappingView {
                    action: "link",
                    remote_person_uid: Some(uid.clone()),
                },
                LocalTarget::CreateRemote => LocalMappingView {
                    action: "create_remote",
                    remote_person_uid: None,
                },
                LocalTarget::DoNotSync => LocalMappingView {
                    action: "do_not_sync",
                    remote_person_uid: None,
                },
            };
            (id.clone(), view)
        })
        .collect();

    Ok(Json(MappingStateResponse {
        local_mappings,
        remote_excludes: staged.remote_excludes.iter().cloned().collect(),
        suggested: staged.suggested.iter().cloned().collect(),
        has_changes,
    }))
}

/// One user edit to the staged mapping
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MappingEdit {
    Link {
        local_person_id: String,
        remote_person_uid: String,
    },
    SetLocal {
        local_person_id: String,
        action: LocalEditAction,
    },
    SetRemote {
        remote_person_uid: String,
        action: RemoteEditAction,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalEditAction {
    CreateRemote,
    DoNotSync,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteEditAction {
    CreateLocal,
    DoNotSync,
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub edits: Vec<MappingEdit>,
}

#[derive(Debug, Serialize)]
pub struct NoticeView {
    pub kind: &'static str,
    pub from_local_id: String,
    pub remote_uid: String,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub actions: Vec<MappingAction>,
    pub notices: Vec<NoticeView>,
    pub has_changes: bool,
}

/// POST /api/mapping/:connection_id/plan
///
/// Rebuilds the staged mapping, applies the caller's edits in order, and
/// returns the action plan the resulting state would activate. Nothing is
/// persisted; the caller submits the returned actions to the activate
/// endpoint.
pub async fn plan_mapping(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(connection_id): Path<String>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    require_user(&headers)?;
    require_active_connection(&state, &connection_id).await?;

    let (_, remotes, committed, mut staged) = build_staged(&state, &connection_id).await?;

    let mut notices = Vec::new();
    for edit in &request.edits {
        let (next, emitted) = match edit {
            MappingEdit::Link {
                local_person_id,
                remote_person_uid,
            } => staged.link_local_to(local_person_id, remote_person_uid),
            MappingEdit::SetLocal {
                local_person_id,
                action,
            } => {
                let action = match action {
                    LocalEditAction::CreateRemote => LocalAction::CreateRemote,
                    LocalEditAction::DoNotSync => LocalAction::DoNotSync,
                };
                staged.set_local_action(local_person_id, action)
            }
            MappingEdit::SetRemote {
                remote_person_uid,
                action,
            } => {
                let action = match action {
                    RemoteEditAction::CreateLocal => RemoteAction::CreateLocal,
                    RemoteEditAction::DoNotSync => RemoteAction::DoNotSync,
                };
                staged.set_remote_action(remote_person_uid, action)
            }
        };
        staged = next;
        notices.extend(emitted);
    }

    let actions = mapping::plan_actions(&staged, &committed, &remotes);
    let has_changes = mapping::has_changes(&staged, &committed, &remotes);

    let notices = notices
        .into_iter()
        .map(|n| match n {
            Notice::Reassigned {
                from_local_id,
                remote_uid,
            } => NoticeView {
                kind: "reassigned",
                from_local_id,
                remote_uid,
            },
        })
        .collect();

    Ok(Json(PlanResponse {
        actions,
        notices,
        has_changes,
    }))
}

/// POST /api/mapping/activate
///
/// Applies each action independently and idempotently; per-action counts,
/// no rollback.
pub async fn activate_mapping(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>, ApiError> {
    require_user(&headers)?;
    let connection = require_active_connection(&state, &request.connection_id).await?;

    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for action in &request.actions {
        match apply_action(&state, &connection, action).await {
            Ok(()) => succeeded += 1,
            Err(e) => {
                warn!("Mapping action failed on connection {}: {}", connection.id, e);
                failed += 1;
            }
        }
    }

    info!(
        "Mapping activation on connection {}: {} succeeded, {} failed",
        connection.id, succeeded, failed
    );

    Ok(Json(ActivateResponse { succeeded, failed }))
}

async fn apply_action(
    state: &AppState,
    connection: &Connection,
    action: &MappingAction,
) -> amity_common::Result<()> {
    match action {
        MappingAction::Link {
            local_person_id,
            remote_person_uid,
        } => {
            links::upsert_linked(&state.db, &connection.id, local_person_id, remote_person_uid)
                .await
        }
        MappingAction::CreateRemote { local_person_id } => {
            // The local person's stable uid becomes the remote identity:
            // link it now and queue the person for push
            let Some(person_uid) = people::person_uid_for_id(&state.db, local_person_id).await?
            else {
                return Err(amity_common::Error::NotFound(format!(
                    "person {}",
                    local_person_id
                )));
            };
            links::upsert_linked(&state.db, &connection.id, local_person_id, &person_uid).await?;
            outbox::enqueue_person(&state.db, &connection.id, &person_uid).await
        }
        MappingAction::CreateLocal {
            remote_person_uid,
            remote_name,
            remote_relationship_label,
        } => {
            let local_id = people::create_from_remote(
                &state.db,
                &connection.user_id,
                remote_person_uid,
                remote_name,
                remote_relationship_label.as_deref(),
            )
            .await?;
            links::upsert_linked(&state.db, &connection.id, &local_id, remote_person_uid).await
        }
        MappingAction::Exclude { remote_person_uid } => {
            links::upsert_excluded(&state.db, &connection.id, remote_person_uid).await
        }
    }
}

type StagedInputs = (Vec<LocalInput>, Vec<RemoteInput>, CommittedState, MappingState);

/// Load mapping inputs from source of truth and build the staged state
async fn build_staged(state: &AppState, connection_id: &str) -> Result<StagedInputs, ApiError> {
    let locals: Vec<LocalInput> = people::list_syncable(&state.db)
        .await?
        .into_iter()
        .map(|p| LocalInput {
            id: p.id,
            name: p.name,
        })
        .collect();

    let remotes: Vec<RemoteInput> = remote_cache::load(&state.db, connection_id)
        .await?
        .into_iter()
        .map(|r| RemoteInput {
            uid: r.person_uid,
            name: r.name,
            relationship_label: r.relationship_label,
        })
        .collect();

    let committed = links::committed_state(&state.db, connection_id).await?;
    let staged = mapping::build_mapping(&locals, &remotes, &committed);

    Ok((locals, remotes, committed, staged))
}

async fn require_active_connection(
    state: &AppState,
    connection_id: &str,
) -> Result<Connection, ApiError> {
    connections::get_connection(&state.db, connection_id)
        .await?
        .filter(Connection::is_active)
        .ok_or_else(|| ApiError::NotFound("connection not found or revoked".to_string()))
}
