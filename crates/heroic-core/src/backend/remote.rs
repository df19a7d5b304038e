//! Remote backend: the signed-in owner's records live in a remote store.
//!
//! Remote stores assign ids and creation timestamps, and push task
//! snapshots to subscribers. A [`Subscription`] is a scoped handle: dropping
//! it unsubscribes, so tearing down a [`RemoteTaskStore`] on owner change
//! can never leave a listener feeding a stale owner's data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use super::{Owner, TaskStore};
use crate::error::StoreError;
use crate::progress::Progress;
use crate::task::{sort_newest_first, Task, TaskDraft};

/// Per-owner remote collection plus a progress document.
///
/// Implementations are shared behind an `Arc`, so every method takes `&self`.
pub trait RemoteStore: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Tasks ordered by `createdAt` descending.
    fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, StoreError>;

    /// Create a task; the store picks the id and creation time.
    fn add_task(&self, owner: &str, draft: &TaskDraft) -> Result<Task, StoreError>;

    fn update_task(&self, owner: &str, task: &Task) -> Result<(), StoreError>;

    fn delete_task(&self, owner: &str, id: &str) -> Result<(), StoreError>;

    fn get_progress(&self, owner: &str) -> Result<Option<Progress>, StoreError>;

    fn set_progress(&self, owner: &str, progress: &Progress) -> Result<(), StoreError>;

    /// Live query over the owner's tasks.
    fn subscribe(&self, owner: &str) -> Result<Subscription, StoreError>;

    /// Pull fresh state for subscribers. Stores that push on their own
    /// leave this as a no-op.
    fn sync(&self, _owner: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

struct Feed {
    tx: watch::Sender<Vec<Task>>,
    subscribers: usize,
}

type FeedMap = Arc<Mutex<HashMap<String, Feed>>>;

fn lock(feeds: &FeedMap) -> MutexGuard<'_, HashMap<String, Feed>> {
    feeds.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-owner snapshot channels shared by remote store implementations.
#[derive(Default, Clone)]
pub struct SnapshotFeeds {
    feeds: FeedMap,
}

impl SnapshotFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. `current` is the state the caller already has.
    pub fn subscribe(&self, owner: &str, current: Vec<Task>) -> Subscription {
        let mut feeds = lock(&self.feeds);
        let feed = feeds.entry(owner.to_string()).or_insert_with(|| Feed {
            tx: watch::channel(current).0,
            subscribers: 0,
        });
        feed.subscribers += 1;
        Subscription {
            owner: owner.to_string(),
            rx: feed.tx.subscribe(),
            feeds: Arc::clone(&self.feeds),
        }
    }

    /// Push a snapshot to the owner's listeners, if any. Identical
    /// snapshots do not wake listeners.
    pub fn publish(&self, owner: &str, mut tasks: Vec<Task>) {
        if let Some(feed) = lock(&self.feeds).get(owner) {
            sort_newest_first(&mut tasks);
            feed.tx.send_if_modified(|current| {
                if *current == tasks {
                    return false;
                }
                *current = tasks;
                true
            });
        }
    }

    pub fn has_subscribers(&self, owner: &str) -> bool {
        self.subscriber_count(owner) > 0
    }

    pub fn subscriber_count(&self, owner: &str) -> usize {
        lock(&self.feeds).get(owner).map_or(0, |f| f.subscribers)
    }
}

/// Scoped live-update handle. Dropping it unsubscribes.
#[must_use]
pub struct Subscription {
    owner: String,
    rx: watch::Receiver<Vec<Task>>,
    feeds: FeedMap,
}

impl Subscription {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Latest snapshot if it changed since the last call.
    pub fn changed(&mut self) -> Option<Vec<Task>> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut feeds = lock(&self.feeds);
        let now_empty = match feeds.get_mut(&self.owner) {
            Some(feed) => {
                feed.subscribers = feed.subscribers.saturating_sub(1);
                feed.subscribers == 0
            }
            None => false,
        };
        if now_empty {
            feeds.remove(&self.owner);
        }
        tracing::debug!(owner = %self.owner, "task subscription released");
    }
}

/// [`TaskStore`] for a signed-in owner over any [`RemoteStore`].
pub struct RemoteTaskStore {
    remote: Arc<dyn RemoteStore>,
    owner: Owner,
    subscription: Option<Subscription>,
}

impl RemoteTaskStore {
    pub fn new(remote: Arc<dyn RemoteStore>, user_id: impl Into<String>) -> Self {
        Self {
            remote,
            owner: Owner::User(user_id.into()),
            subscription: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl TaskStore for RemoteTaskStore {
    fn owner(&self) -> &Owner {
        &self.owner
    }

    fn list(&mut self) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.remote.list_tasks(self.owner.id())?;
        sort_newest_first(&mut tasks);
        if self.subscription.is_none() {
            self.subscription = Some(self.remote.subscribe(self.owner.id())?);
            tracing::debug!(store = self.remote.name(), owner = %self.owner, "subscribed to task updates");
        }
        Ok(tasks)
    }

    fn add(&mut self, draft: TaskDraft) -> Result<Task, StoreError> {
        self.remote.add_task(self.owner.id(), &draft)
    }

    fn update(&mut self, task: &Task) -> Result<(), StoreError> {
        self.remote.update_task(self.owner.id(), task)
    }

    fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        self.remote.delete_task(self.owner.id(), id)
    }

    fn load_progress(&mut self) -> Result<Progress, StoreError> {
        match self.remote.get_progress(self.owner.id())? {
            Some(progress) => Ok(progress.normalized()),
            None => {
                let fresh = Progress::default();
                self.remote.set_progress(self.owner.id(), &fresh)?;
                tracing::info!(owner = %self.owner, "created remote progress record");
                Ok(fresh)
            }
        }
    }

    fn save_progress(&mut self, progress: &Progress) -> Result<(), StoreError> {
        self.remote.set_progress(self.owner.id(), progress)
    }

    fn poll_changes(&mut self) -> Option<Vec<Task>> {
        let subscription = self.subscription.as_mut()?;
        if let Err(e) = self.remote.sync(self.owner.id()) {
            tracing::warn!(error = %e, owner = %self.owner, "live update sync failed");
        }
        subscription.changed()
    }
}
