//! Task store adapter.
//!
//! One capability set, [`TaskStore`], with two implementations selected by
//! the active owner: [`LocalTaskStore`] for guests (device slots) and
//! [`RemoteTaskStore`] for signed-in users (any [`RemoteStore`]). The reward
//! ledger and progress calculator never see which one is in use.

mod http;
mod local;
mod memory;
mod remote;

pub use http::HttpRemoteStore;
pub use local::{generate_local_id, LocalTaskStore, GUEST_PROFILE_KEY, GUEST_TASKS_KEY};
pub use memory::MemoryRemoteStore;
pub use remote::{RemoteStore, RemoteTaskStore, SnapshotFeeds, Subscription};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::progress::Progress;
use crate::task::{Task, TaskDraft};

/// Scope under which tasks and progress are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    Guest,
    User(String),
}

impl Owner {
    pub fn is_guest(&self) -> bool {
        matches!(self, Owner::Guest)
    }

    pub fn id(&self) -> &str {
        match self {
            Owner::Guest => "guest",
            Owner::User(id) => id,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Guest => f.write_str("guest"),
            Owner::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Persistence for one owner's tasks and progress.
///
/// Both implementations list newest first and hand back records with the
/// same shape; ids and creation timestamps are assigned by the store.
pub trait TaskStore {
    fn owner(&self) -> &Owner;

    /// All tasks, ordered by `createdAt` descending.
    fn list(&mut self) -> Result<Vec<Task>, StoreError>;

    /// Create a task from a validated draft.
    fn add(&mut self, draft: TaskDraft) -> Result<Task, StoreError>;

    /// Replace the stored record with the same id.
    fn update(&mut self, task: &Task) -> Result<(), StoreError>;

    fn remove(&mut self, id: &str) -> Result<(), StoreError>;

    /// The owner's progress, created as xp 0 / level 1 on first access.
    fn load_progress(&mut self) -> Result<Progress, StoreError>;

    fn save_progress(&mut self, progress: &Progress) -> Result<(), StoreError>;

    /// Newest snapshot pushed by the backend since the last call.
    fn poll_changes(&mut self) -> Option<Vec<Task>> {
        None
    }

    /// Failure from a fire-and-forget write that already returned `Ok`.
    fn take_deferred_error(&mut self) -> Option<StoreError> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ids() {
        assert_eq!(Owner::Guest.id(), "guest");
        assert_eq!(Owner::User("abc".into()).id(), "abc");
        assert_eq!(Owner::User("abc".into()).to_string(), "user:abc");
        assert!(Owner::Guest.is_guest());
    }
}
