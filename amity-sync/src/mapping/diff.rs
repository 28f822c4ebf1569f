//! Staged-vs-committed diffing and activation planning
//!
//! `has_changes` gates the activate button; `plan_actions` turns the diff
//! into the idempotent batch submitted to the activation endpoint. Actions
//! are derived strictly from the diff, never by re-deriving full desired
//! state, so an activation run touches only what the user changed.

use amity_common::api::types::MappingAction;

use super::state::{CommittedState, LocalTarget, MappingState, RemoteInput};

/// True when activating would do anything.
///
/// Three facets:
/// (a) a local id whose resolved action differs from its committed link,
/// (b) a remote uid whose excluded state differs from committed,
/// (c) a remote person that resolves to create-local now but was linked
///     in committed state.
pub fn has_changes(
    staged: &MappingState,
    committed: &CommittedState,
    remotes: &[RemoteInput],
) -> bool {
    // (a) local side
    for (local_id, target) in &staged.local {
        match (committed.links.get(local_id), target) {
            (Some(committed_uid), LocalTarget::Linked(uid)) if uid == committed_uid => {}
            (Some(_), _) => return true,
            // No committed link: a pairing or create-remote is new work;
            // do-not-sync with nothing committed has no server action
            (None, LocalTarget::Linked(_)) | (None, LocalTarget::CreateRemote) => return true,
            (None, LocalTarget::DoNotSync) => {}
        }
    }

    // (b) exclude set
    if staged.remote_excludes != committed.excluded {
        return true;
    }

    // (c) remote people released from a committed link
    for remote in remotes {
        if staged.remote_is_unclaimed(&remote.uid) && committed.is_remote_linked(&remote.uid) {
            return true;
        }
    }

    false
}

/// Derive the activation batch from the diff. Empty plan means no network
/// call is made.
pub fn plan_actions(
    staged: &MappingState,
    committed: &CommittedState,
    remotes: &[RemoteInput],
) -> Vec<MappingAction> {
    let mut actions = Vec::new();

    for (local_id, target) in &staged.local {
        match target {
            LocalTarget::Linked(remote_uid) => {
                if committed.links.get(local_id) != Some(remote_uid) {
                    actions.push(MappingAction::Link {
                        local_person_id: local_id.clone(),
                        remote_person_uid: remote_uid.clone(),
                    });
                }
            }
            LocalTarget::CreateRemote => {
                if !committed.links.contains_key(local_id) {
                    actions.push(MappingAction::CreateRemote {
                        local_person_id: local_id.clone(),
                    });
                }
            }
            LocalTarget::DoNotSync => {}
        }
    }

    for remote in remotes {
        if staged.remote_is_unclaimed(&remote.uid) && !committed.is_remote_linked(&remote.uid) {
            actions.push(MappingAction::CreateLocal {
                remote_person_uid: remote.uid.clone(),
                remote_name: remote.name.clone(),
                remote_relationship_label: remote.relationship_label.clone(),
            });
        }
    }

    for remote_uid in staged.remote_excludes.difference(&committed.excluded) {
        actions.push(MappingAction::Exclude {
            remote_person_uid: remote_uid.clone(),
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn remote(uid: &str, name: &str) -> RemoteInput {
        RemoteInput {
            uid: uid.to_string(),
            name: name.to_string(),
            relationship_label: None,
        }
    }

    fn committed(links: &[(&str, &str)], excluded: &[&str]) -> CommittedState {
        CommittedState {
            links: links
                .iter()
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .collect::<BTreeMap<_, _>>(),
            excluded: excluded.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn staged(local: &[(&str, LocalTarget)], excludes: &[&str]) -> MappingState {
        MappingState {
            local: local
                .iter()
                .map(|(id, t)| (id.to_string(), t.clone()))
                .collect(),
            remote_excludes: excludes.iter().map(|s| s.to_string()).collect(),
            suggested: BTreeSet::new(),
        }
    }

    #[test]
    fn unchanged_state_has_no_changes_and_empty_plan() {
        let committed = committed(&[("l1", "r1")], &["r2"]);
        let state = staged(&[("l1", LocalTarget::Linked("r1".to_string()))], &["r2"]);
        let remotes = [remote("r1", "Alex"), remote("r2", "Morgan")];

        assert!(!has_changes(&state, &committed, &remotes));
        assert!(plan_actions(&state, &committed, &remotes).is_empty());
    }

    #[test]
    fn new_link_produces_link_action() {
        let committed = committed(&[], &[]);
        let state = staged(&[("l1", LocalTarget::Linked("r1".to_string()))], &[]);
        // r1 paired -> no create_local for it
        let remotes = [remote("r1", "Alex")];

        assert!(has_changes(&state, &committed, &remotes));
        assert_eq!(
            plan_actions(&state, &committed, &remotes),
            vec![MappingAction::Link {
                local_person_id: "l1".to_string(),
                remote_person_uid: "r1".to_string(),
            }]
        );
    }

    #[test]
    fn reassigned_link_produces_link_action_only_for_changed_local() {
        let committed = committed(&[("l1", "r1")], &[]);
        let state = staged(&[("l1", LocalTarget::Linked("r2".to_string()))], &[]);
        let remotes = [remote("r2", "Alex")];

        let actions = plan_actions(&state, &committed, &remotes);
        assert_eq!(
            actions,
            vec![MappingAction::Link {
                local_person_id: "l1".to_string(),
                remote_person_uid: "r2".to_string(),
            }]
        );
    }

    #[test]
    fn create_remote_only_without_prior_committed_link() {
        let remotes: [RemoteInput; 0] = [];

        // No committed link: create_remote
        let state = staged(&[("l1", LocalTarget::CreateRemote)], &[]);
        let actions = plan_actions(&state, &committed(&[], &[]), &remotes);
        assert_eq!(
            actions,
            vec![MappingAction::CreateRemote {
                local_person_id: "l1".to_string(),
            }]
        );

        // Prior committed link: the staged CreateRemote is a removal, which
        // has no push action of its own
        let actions = plan_actions(&state, &committed(&[("l1", "r1")], &[]), &remotes);
        assert!(actions.is_empty());
    }

    #[test]
    fn unclaimed_remote_produces_create_local() {
        let state = staged(&[], &[]);
        let remotes = [remote("r1", "Morgan")];

        let actions = plan_actions(&state, &committed(&[], &[]), &remotes);
        assert_eq!(
            actions,
            vec![MappingAction::CreateLocal {
                remote_person_uid: "r1".to_string(),
                remote_name: "Morgan".to_string(),
                remote_relationship_label: None,
            }]
        );

        // A remote linked in committed state never becomes create_local
        let actions = plan_actions(&state, &committed(&[("l9", "r1")], &[]), &remotes);
        assert!(actions.is_empty());
    }

    #[test]
    fn new_exclusion_produces_exclude_action() {
        let state = staged(&[], &["r1"]);
        let remotes = [remote("r1", "Morgan")];

        let actions = plan_actions(&state, &committed(&[], &[]), &remotes);
        assert_eq!(
            actions,
            vec![MappingAction::Exclude {
                remote_person_uid: "r1".to_string(),
            }]
        );
    }

    #[test]
    fn removed_exclusion_is_a_change_even_without_an_action() {
        let state = staged(&[], &[]);
        let committed = committed(&[], &["r1"]);
        // r1 no longer cached remotely
        let remotes: [RemoteInput; 0] = [];

        assert!(has_changes(&state, &committed, &remotes));
    }

    #[test]
    fn remote_released_from_committed_link_is_a_change() {
        // l1 was linked to r1; staged drops l1 to DoNotSync, so r1 would
        // resolve to create-local now
        let committed = committed(&[("l1", "r1")], &[]);
        let state = staged(&[("l1", LocalTarget::DoNotSync)], &[]);
        let remotes = [remote("r1", "Alex")];

        assert!(has_changes(&state, &committed, &remotes));
    }

    #[test]
    fn do_not_sync_with_no_committed_link_is_not_a_change() {
        let state = staged(&[("l1", LocalTarget::DoNotSync)], &[]);
        let remotes: [RemoteInput; 0] = [];
        assert!(!has_changes(&state, &committed(&[], &[]), &remotes));
    }
}
