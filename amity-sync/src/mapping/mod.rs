//! Identity mapping engine
//!
//! Pure logic for pairing local people with a peer's people: name matching,
//! staged mapping construction, user-driven reconciliation, and the diff
//! that drives activation. No database or HTTP dependencies - the API layer
//! is a thin consumer of these value objects.

pub mod diff;
pub mod matcher;
pub mod reconcile;
pub mod state;

pub use diff::{has_changes, plan_actions};
pub use matcher::{match_names, NameMatch};
pub use state::{build_mapping, CommittedState, LocalInput, LocalTarget, MappingState, RemoteInput};
