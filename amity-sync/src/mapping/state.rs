//! Staged mapping state and builder
//!
//! The staged mapping is an in-memory value object seeded from committed
//! links, then filled in with matcher suggestions for anything unlinked.
//! BTreeMap/BTreeSet keep iteration order stable so suggestion tie-breaks
//! and action plans are deterministic.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::matcher::match_names;

/// Resolved action for one local person in the staged mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTarget {
    /// Paired with the remote person carrying this uid
    Linked(String),
    /// Create a counterpart on the peer system
    CreateRemote,
    /// Leave this person out of sync entirely
    DoNotSync,
}

/// Local person input to the builder (archived and merged-away records are
/// excluded before this point)
#[derive(Debug, Clone)]
pub struct LocalInput {
    pub id: String,
    pub name: String,
}

/// Remote person input, from the remote_people cache
#[derive(Debug, Clone)]
pub struct RemoteInput {
    pub uid: String,
    pub name: String,
    pub relationship_label: Option<String>,
}

/// Committed mapping state loaded from person_links
#[derive(Debug, Clone, Default)]
pub struct CommittedState {
    /// local person id -> remote person uid, from `linked` rows
    pub links: BTreeMap<String, String>,
    /// remote uids from `excluded` rows
    pub excluded: BTreeSet<String>,
}

impl CommittedState {
    /// True if the remote uid is the target of any committed link
    pub fn is_remote_linked(&self, remote_uid: &str) -> bool {
        self.links.values().any(|uid| uid == remote_uid)
    }
}

/// The staged, user-editable mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingState {
    /// local person id -> resolved target
    pub local: BTreeMap<String, LocalTarget>,
    /// remote uids excluded from sync
    pub remote_excludes: BTreeSet<String>,
    /// local ids whose pairing came from the matcher, not a committed link
    /// or an explicit user edit
    pub suggested: BTreeSet<String>,
}

impl MappingState {
    /// Local id currently paired with the given remote uid, if any
    pub fn local_for_remote(&self, remote_uid: &str) -> Option<&str> {
        self.local.iter().find_map(|(lid, target)| match target {
            LocalTarget::Linked(uid) if uid == remote_uid => Some(lid.as_str()),
            _ => None,
        })
    }

    /// True if the remote uid is neither paired nor excluded - it would
    /// resolve to "create local" on activation
    pub fn remote_is_unclaimed(&self, remote_uid: &str) -> bool {
        self.local_for_remote(remote_uid).is_none() && !self.remote_excludes.contains(remote_uid)
    }
}

/// Build the staged mapping from local people, cached remote people, and
/// committed links.
///
/// Committed rows always win: a committed link is never overwritten by a
/// suggestion, and committed excludes seed the exclude set. Every remaining
/// local person is matched against the unclaimed remote pool; the best
/// match at or above 0.50 claims that remote (first encountered wins ties)
/// so no remote person is claimed twice in one pass.
pub fn build_mapping(
    locals: &[LocalInput],
    remotes: &[RemoteInput],
    committed: &CommittedState,
) -> MappingState {
    let mut state = MappingState {
        remote_excludes: committed.excluded.clone(),
        ..Default::default()
    };

    let local_ids: HashSet<&str> = locals.iter().map(|l| l.id.as_str()).collect();

    // Pool of remote uids already spoken for
    let mut claimed: HashSet<String> = committed.excluded.iter().cloned().collect();

    // Seed from committed links
    for (local_id, remote_uid) in &committed.links {
        if local_ids.contains(local_id.as_str()) {
            state
                .local
                .insert(local_id.clone(), LocalTarget::Linked(remote_uid.clone()));
        }
        claimed.insert(remote_uid.clone());
    }

    // Suggest pairings for everything unlinked
    for local in locals {
        if state.local.contains_key(&local.id) {
            continue;
        }

        let mut best: Option<(usize, f64)> = None;
        for (idx, remote) in remotes.iter().enumerate() {
            if claimed.contains(&remote.uid) {
                continue;
            }
            if let Some(m) = match_names(&local.name, &remote.name) {
                // Strictly greater: first encountered wins ties
                if best.map_or(true, |(_, conf)| m.confidence > conf) {
                    best = Some((idx, m.confidence));
                }
            }
        }

        match best {
            Some((idx, confidence)) => {
                let remote = &remotes[idx];
                state
                    .local
                    .insert(local.id.clone(), LocalTarget::Linked(remote.uid.clone()));
                claimed.insert(remote.uid.clone());
                if confidence < 0.95 {
                    state.suggested.insert(local.id.clone());
                }
            }
            None => {
                state.local.insert(local.id.clone(), LocalTarget::CreateRemote);
            }
        }
    }

    state
}
