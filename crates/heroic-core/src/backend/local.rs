//! Guest backend over two device slots.
//!
//! The whole task collection and the progress record are each stored as one
//! JSON snapshot and rewritten after every mutation. Writes are
//! fire-and-forget: a failed write is logged and parked for the session
//! controller to report, and the in-memory collection stays authoritative.

use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::{Owner, TaskStore};
use crate::error::StoreError;
use crate::progress::Progress;
use crate::storage::SlotStorage;
use crate::task::{sort_newest_first, Task, TaskDraft};

pub const GUEST_TASKS_KEY: &str = "heroicTasks_guestTasks";
pub const GUEST_PROFILE_KEY: &str = "heroicTasks_guestProfile";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 7;

/// `local_<epoch-millis>_<7 base-36 chars>`.
pub fn generate_local_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("local_{}_{}", now.timestamp_millis(), suffix)
}

pub struct LocalTaskStore {
    slots: Rc<dyn SlotStorage>,
    owner: Owner,
    tasks: Vec<Task>,
    loaded: bool,
    deferred_error: Option<StoreError>,
}

impl LocalTaskStore {
    pub fn new(slots: Rc<dyn SlotStorage>) -> Self {
        Self {
            slots,
            owner: Owner::Guest,
            tasks: Vec::new(),
            loaded: false,
            deferred_error: None,
        }
    }

    fn ensure_loaded(&mut self) -> Result<(), StoreError> {
        if self.loaded {
            return Ok(());
        }
        let mut tasks: Vec<Task> = match self.slots.read_slot(GUEST_TASKS_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        sort_newest_first(&mut tasks);
        tracing::debug!(count = tasks.len(), "loaded guest tasks");
        self.tasks = tasks;
        self.loaded = true;
        Ok(())
    }

    fn persist_tasks(&mut self) {
        let result = serde_json::to_string(&self.tasks)
            .map_err(StoreError::from)
            .and_then(|json| self.slots.write_slot(GUEST_TASKS_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to save guest tasks");
            self.deferred_error = Some(e);
        }
    }

    /// Creation time strictly after every existing task's.
    fn next_created_at(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.tasks.iter().map(Task::created_at).max() {
            Some(newest) if newest >= now => newest + Duration::milliseconds(1),
            _ => now,
        }
    }

    fn unique_id(&self, now: DateTime<Utc>) -> String {
        loop {
            let id = generate_local_id(now);
            if !self.tasks.iter().any(|t| t.id() == id) {
                return id;
            }
        }
    }

    fn position(&self, id: &str) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl TaskStore for LocalTaskStore {
    fn owner(&self) -> &Owner {
        &self.owner
    }

    fn list(&mut self) -> Result<Vec<Task>, StoreError> {
        self.ensure_loaded()?;
        Ok(self.tasks.clone())
    }

    fn add(&mut self, draft: TaskDraft) -> Result<Task, StoreError> {
        self.ensure_loaded()?;
        let created_at = self.next_created_at();
        let task = Task::from_draft(self.unique_id(created_at), created_at, draft);
        self.tasks.insert(0, task.clone());
        self.persist_tasks();
        Ok(task)
    }

    fn update(&mut self, task: &Task) -> Result<(), StoreError> {
        self.ensure_loaded()?;
        let idx = self.position(task.id())?;
        self.tasks[idx] = task.clone();
        self.persist_tasks();
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        self.ensure_loaded()?;
        let idx = self.position(id)?;
        self.tasks.remove(idx);
        self.persist_tasks();
        Ok(())
    }

    fn load_progress(&mut self) -> Result<Progress, StoreError> {
        match self.slots.read_slot(GUEST_PROFILE_KEY)? {
            Some(json) => Ok(serde_json::from_str::<Progress>(&json)?.normalized()),
            None => {
                let fresh = Progress::default();
                self.save_progress(&fresh)?;
                Ok(fresh)
            }
        }
    }

    fn save_progress(&mut self, progress: &Progress) -> Result<(), StoreError> {
        let result = serde_json::to_string(progress)
            .map_err(StoreError::from)
            .and_then(|json| self.slots.write_slot(GUEST_PROFILE_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to save guest progress");
            self.deferred_error = Some(e);
        }
        Ok(())
    }

    fn take_deferred_error(&mut self) -> Option<StoreError> {
        self.deferred_error.take()
    }
}
