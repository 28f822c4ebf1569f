//! Mapping reconciliation
//!
//! User edits to the staged mapping, expressed as pure transitions: each
//! returns a new state plus the notifications the UI should surface. The
//! invariant - a remote person is the target of at most one local mapping -
//! is enforced inside each transition rather than checked after the fact.

use super::state::{LocalTarget, MappingState};

/// Side effects a transition wants surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A remote person was taken away from a previously paired local
    /// person, which was reset to CreateRemote
    Reassigned {
        from_local_id: String,
        remote_uid: String,
    },
}

/// Non-link actions assignable to a local person
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    CreateRemote,
    DoNotSync,
}

/// Non-link actions assignable to a remote person
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    CreateLocal,
    DoNotSync,
}

impl MappingState {
    /// Pair a local person with a remote person.
    ///
    /// If the remote was already the target of a different local mapping,
    /// that local is reset to CreateRemote and a Reassigned notice is
    /// emitted. The edit is explicit, so the local's suggested flag clears.
    pub fn link_local_to(&self, local_id: &str, remote_uid: &str) -> (MappingState, Vec<Notice>) {
        let mut next = self.clone();
        let mut notices = Vec::new();

        if let Some(previous) = next.local_for_remote(remote_uid).map(str::to_string) {
            if previous != local_id {
                next.local
                    .insert(previous.clone(), LocalTarget::CreateRemote);
                next.suggested.remove(&previous);
                notices.push(Notice::Reassigned {
                    from_local_id: previous,
                    remote_uid: remote_uid.to_string(),
                });
            }
        }

        next.local
            .insert(local_id.to_string(), LocalTarget::Linked(remote_uid.to_string()));
        next.remote_excludes.remove(remote_uid);
        next.suggested.remove(local_id);

        (next, notices)
    }

    /// Set a local person to CreateRemote or DoNotSync, clearing any
    /// pairing it held.
    pub fn set_local_action(&self, local_id: &str, action: LocalAction) -> (MappingState, Vec<Notice>) {
        let mut next = self.clone();

        let target = match action {
            LocalAction::CreateRemote => LocalTarget::CreateRemote,
            LocalAction::DoNotSync => LocalTarget::DoNotSync,
        };
        next.local.insert(local_id.to_string(), target);
        next.suggested.remove(local_id);

        (next, Vec::new())
    }

    /// Pair from the remote side; same invariant and effects as
    /// [`link_local_to`](Self::link_local_to).
    pub fn link_remote_to(&self, remote_uid: &str, local_id: &str) -> (MappingState, Vec<Notice>) {
        self.link_local_to(local_id, remote_uid)
    }

    /// Set a remote person to CreateLocal or DoNotSync. Either way any
    /// local person paired with it is released back to CreateRemote.
    pub fn set_remote_action(&self, remote_uid: &str, action: RemoteAction) -> (MappingState, Vec<Notice>) {
        let mut next = self.clone();

        if let Some(holder) = next.local_for_remote(remote_uid).map(str::to_string) {
            next.local.insert(holder.clone(), LocalTarget::CreateRemote);
            next.suggested.remove(&holder);
        }

        match action {
            RemoteAction::CreateLocal => {
                next.remote_excludes.remove(remote_uid);
            }
            RemoteAction::DoNotSync => {
                next.remote_excludes.insert(remote_uid.to_string());
            }
        }

        (next, Vec::new())
    }
}
