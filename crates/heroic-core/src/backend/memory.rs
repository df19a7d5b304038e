//! In-process remote store.
//!
//! Behaves like a hosted backend (server-assigned ids and timestamps,
//! pushed snapshots) without a network. Used by tests and for offline demos;
//! availability and write failures can be toggled to simulate outages.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::remote::{RemoteStore, SnapshotFeeds, Subscription};
use crate::error::StoreError;
use crate::progress::Progress;
use crate::task::{sort_newest_first, Task, TaskDraft};

#[derive(Default)]
struct State {
    tasks: HashMap<String, Vec<Task>>,
    progress: HashMap<String, Progress>,
    unavailable: bool,
    fail_writes: bool,
    last_created_at: Option<DateTime<Utc>>,
}

impl State {
    fn check_read(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unreachable("remote store is offline".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check_read()?;
        if self.fail_writes {
            return Err(StoreError::Rejected("write refused".into()));
        }
        Ok(())
    }

    fn sorted(&self, owner: &str) -> Vec<Task> {
        let mut tasks = self.tasks.get(owner).cloned().unwrap_or_default();
        sort_newest_first(&mut tasks);
        tasks
    }

    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_created_at {
            Some(last) if last >= now => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_created_at = Some(at);
        at
    }
}

#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<State>,
    feeds: SnapshotFeeds,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Simulate an outage: every call fails with `Unreachable` while false.
    pub fn set_available(&self, available: bool) {
        self.state().unavailable = !available;
    }

    /// Reads keep working but every write is rejected.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn subscriber_count(&self, owner: &str) -> usize {
        self.feeds.subscriber_count(owner)
    }

    pub fn task_count(&self, owner: &str) -> usize {
        self.state().tasks.get(owner).map_or(0, Vec::len)
    }

    /// Insert a record as if another device had written it, and notify
    /// listeners.
    pub fn seed_task(&self, owner: &str, task: Task) {
        let snapshot = {
            let mut state = self.state();
            state.tasks.entry(owner.to_string()).or_default().push(task);
            state.sorted(owner)
        };
        self.feeds.publish(owner, snapshot);
    }

    pub fn seed_progress(&self, owner: &str, progress: Progress) {
        self.state().progress.insert(owner.to_string(), progress);
    }

    /// Stored progress without creating a default.
    pub fn stored_progress(&self, owner: &str) -> Option<Progress> {
        self.state().progress.get(owner).copied()
    }

    fn publish_current(&self, owner: &str) {
        let snapshot = self.state().sorted(owner);
        self.feeds.publish(owner, snapshot);
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        let state = self.state();
        state.check_read()?;
        Ok(state.sorted(owner))
    }

    fn add_task(&self, owner: &str, draft: &TaskDraft) -> Result<Task, StoreError> {
        let task = {
            let mut state = self.state();
            state.check_write()?;
            let created_at = state.next_created_at();
            let task = Task::from_draft(Uuid::new_v4().to_string(), created_at, draft.clone());
            state
                .tasks
                .entry(owner.to_string())
                .or_default()
                .push(task.clone());
            task
        };
        self.publish_current(owner);
        Ok(task)
    }

    fn update_task(&self, owner: &str, task: &Task) -> Result<(), StoreError> {
        {
            let mut state = self.state();
            state.check_write()?;
            let slot = state
                .tasks
                .get_mut(owner)
                .and_then(|tasks| tasks.iter_mut().find(|t| t.id() == task.id()))
                .ok_or_else(|| StoreError::NotFound(task.id().to_string()))?;
            *slot = task.clone();
        }
        self.publish_current(owner);
        Ok(())
    }

    fn delete_task(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        {
            let mut state = self.state();
            state.check_write()?;
            let tasks = state
                .tasks
                .get_mut(owner)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let idx = tasks
                .iter()
                .position(|t| t.id() == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            tasks.remove(idx);
        }
        self.publish_current(owner);
        Ok(())
    }

    fn get_progress(&self, owner: &str) -> Result<Option<Progress>, StoreError> {
        let state = self.state();
        state.check_read()?;
        Ok(state.progress.get(owner).copied())
    }

    fn set_progress(&self, owner: &str, progress: &Progress) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check_write()?;
        state.progress.insert(owner.to_string(), *progress);
        Ok(())
    }

    fn subscribe(&self, owner: &str) -> Result<Subscription, StoreError> {
        let current = {
            let state = self.state();
            state.check_read()?;
            state.sorted(owner)
        };
        Ok(self.feeds.subscribe(owner, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_assigns_ids_and_orders_newest_first() {
        let store = MemoryRemoteStore::new();
        let a = store.add_task("u1", &TaskDraft::new("a")).unwrap();
        let b = store.add_task("u1", &TaskDraft::new("b")).unwrap();
        assert!(Uuid::parse_str(a.id()).is_ok());
        assert!(b.created_at() > a.created_at());
        assert_eq!(store.list_tasks("u1").unwrap(), vec![b, a]);
        assert!(store.list_tasks("u2").unwrap().is_empty());
    }

    #[test]
    fn writes_reach_subscribers() {
        let store = MemoryRemoteStore::new();
        let mut sub = store.subscribe("u1").unwrap();
        assert_eq!(store.subscriber_count("u1"), 1);

        let task = store.add_task("u1", &TaskDraft::new("pushed")).unwrap();
        assert_eq!(sub.changed(), Some(vec![task.clone()]));

        store.delete_task("u1", task.id()).unwrap();
        assert_eq!(sub.changed(), Some(Vec::new()));

        drop(sub);
        assert_eq!(store.subscriber_count("u1"), 0);
    }

    #[test]
    fn outage_and_rejected_writes() {
        let store = MemoryRemoteStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.add_task("u1", &TaskDraft::new("x")),
            Err(StoreError::Rejected(_))
        ));
        assert!(store.list_tasks("u1").is_ok());

        store.set_available(false);
        assert!(matches!(
            store.list_tasks("u1"),
            Err(StoreError::Unreachable(_))
        ));
        assert!(store.subscribe("u1").is_err());
    }

    #[test]
    fn missing_records_are_not_found() {
        let store = MemoryRemoteStore::new();
        assert!(matches!(
            store.delete_task("u1", "nope"),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.get_progress("u1").unwrap(), None);
    }
}
