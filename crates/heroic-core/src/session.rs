//! Session controller: owns the active owner, its task store and the
//! in-memory view, and routes every mutation through the store and every
//! completion through the reward ledger.
//!
//! State machine:
//!
//! ```text
//! uninitialized --signed in--> loading --ok--> authenticated
//!       |                         \--read failure--> degraded --refresh--> loading
//!       |--enter guest--> guest
//!       \--signed out--> signed_out
//! authenticated/degraded/guest --sign out / exit guest--> signed_out
//! guest --signed in--> (guest torn down) loading
//! ```
//!
//! Every change is reported as an [`Event`]; callers drain them after each
//! action.
//!
//! Writes the store rejected stay queued until a later mutation or
//! `refresh` delivers them. Live snapshots and reloads are overlaid with the
//! queue, so the in-memory tasks and progress always agree on which rewards
//! were paid.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{LocalTaskStore, Owner, RemoteStore, RemoteTaskStore, TaskStore};
use crate::error::{EngineError, Result, StoreError};
use crate::events::Event;
use crate::ledger::{on_completion_toggle, CompletionOutcome};
use crate::progress::{Progress, Rank};
use crate::report::{build_report, Report};
use crate::storage::{Config, SlotStorage};
use crate::task::{Task, TaskDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Uninitialized,
    Loading,
    Guest,
    Authenticated,
    SignedOut,
    /// Backend unreachable; last-known data is kept and mutations may fail.
    Degraded,
}

/// Notification from the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    SignedIn { user_id: String },
    SignedOut,
}

/// Per-session settings, created explicitly and handed to the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    muted: bool,
    started_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn new(muted: bool) -> Self {
        Self {
            muted,
            started_at: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sound.muted)
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// When the current owner's session began, if one is active.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn begin(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
    }

    fn end(&mut self) {
        self.started_at = None;
    }
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Update(Task),
    Remove,
}

/// Mutations applied in memory but not yet accepted by the store.
#[derive(Debug, Default)]
struct PendingWrites {
    tasks: BTreeMap<String, PendingWrite>,
    progress: bool,
}

impl PendingWrites {
    fn is_empty(&self) -> bool {
        self.tasks.is_empty() && !self.progress
    }

    fn len(&self) -> usize {
        self.tasks.len() + usize::from(self.progress)
    }

    /// Deliver queued writes, task records before progress. Stops at the
    /// first failure and keeps the rest queued. A record the store no longer
    /// has is dropped from the queue.
    fn flush(
        &mut self,
        store: &mut dyn TaskStore,
        progress: &Progress,
    ) -> std::result::Result<(), (&'static str, StoreError)> {
        while let Some((id, write)) = self.tasks.pop_first() {
            let (operation, result) = match &write {
                PendingWrite::Update(task) => ("update task", store.update(task)),
                PendingWrite::Remove => ("delete task", store.remove(&id)),
            };
            match result {
                Ok(()) => {}
                Err(e @ StoreError::NotFound(_)) => return Err((operation, e)),
                Err(e) => {
                    self.tasks.insert(id, write);
                    return Err((operation, e));
                }
            }
        }
        if self.progress {
            store
                .save_progress(progress)
                .map_err(|e| ("save progress", e))?;
            self.progress = false;
        }
        Ok(())
    }

    /// Lay queued task writes over a snapshot read from the store.
    fn overlay(&self, tasks: &mut Vec<Task>) {
        if self.tasks.is_empty() {
            return;
        }
        tasks.retain(|t| !matches!(self.tasks.get(t.id()), Some(PendingWrite::Remove)));
        for task in tasks.iter_mut() {
            if let Some(PendingWrite::Update(local)) = self.tasks.get(task.id()) {
                *task = local.clone();
            }
        }
    }
}

pub struct SessionController {
    context: SessionContext,
    slots: Rc<dyn SlotStorage>,
    remote: Option<Arc<dyn RemoteStore>>,
    status: SessionStatus,
    owner: Option<Owner>,
    store: Option<Box<dyn TaskStore>>,
    tasks: Vec<Task>,
    progress: Progress,
    pending: PendingWrites,
    events: Vec<Event>,
}

impl SessionController {
    /// `remote` is `None` when no remote backend is configured; signing in
    /// then lands in `degraded`.
    pub fn new(
        context: SessionContext,
        slots: Rc<dyn SlotStorage>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Self {
        Self {
            context,
            slots,
            remote,
            status: SessionStatus::Uninitialized,
            owner: None,
            store: None,
            tasks: Vec::new(),
            progress: Progress::default(),
            pending: PendingWrites::default(),
            events: Vec::new(),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn is_guest(&self) -> bool {
        self.owner.as_ref().is_some_and(Owner::is_guest)
    }

    /// Newest first.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn xp_to_next_level(&self) -> u64 {
        self.progress.xp_to_next_level()
    }

    pub fn rank(&self) -> Rank {
        self.progress.rank()
    }

    pub fn report(&self) -> Report {
        build_report(&self.tasks, self.progress)
    }

    /// Number of writes still waiting for the store to accept them.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    /// Take every event produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Session transitions ─────────────────────────────────────────

    pub fn on_identity_changed(&mut self, identity: Identity) {
        match identity {
            Identity::SignedIn { user_id } => self.sign_in(user_id),
            Identity::SignedOut => {
                if self.is_guest() {
                    tracing::debug!("signed-out notification ignored in guest mode");
                    return;
                }
                self.sign_out();
            }
        }
    }

    fn sign_in(&mut self, user_id: String) {
        let owner = Owner::User(user_id.clone());
        if self.owner.as_ref() == Some(&owner) && self.status == SessionStatus::Authenticated {
            return;
        }
        if self.owner.is_some() {
            tracing::info!(from = ?self.owner, to = %owner, "switching owner");
            self.teardown();
        }

        self.owner = Some(owner);
        self.context.begin(Utc::now());
        match &self.remote {
            Some(remote) => {
                self.store = Some(Box::new(RemoteTaskStore::new(Arc::clone(remote), user_id)));
                self.load();
            }
            None => {
                self.fail(EngineError::StoreUnavailable(
                    "no remote store configured".into(),
                ));
                self.set_status(SessionStatus::Degraded);
            }
        }
    }

    /// Opt in to guest mode. Rejected while a user is signed in.
    pub fn enter_guest(&mut self) -> bool {
        match &self.owner {
            Some(Owner::Guest) => return true,
            Some(Owner::User(_)) => {
                tracing::warn!("guest mode requested while signed in, ignoring");
                return false;
            }
            None => {}
        }
        self.owner = Some(Owner::Guest);
        self.store = Some(Box::new(LocalTaskStore::new(Rc::clone(&self.slots))));
        self.context.begin(Utc::now());
        self.load();
        true
    }

    pub fn exit_guest(&mut self) {
        if !self.is_guest() {
            return;
        }
        self.teardown();
        self.set_status(SessionStatus::SignedOut);
    }

    /// Drop the active owner and its subscription and clear the view.
    pub fn sign_out(&mut self) {
        if self.owner.is_some() {
            self.teardown();
        }
        if self.status != SessionStatus::SignedOut {
            self.set_status(SessionStatus::SignedOut);
        }
    }

    /// Retry the load for the current owner, e.g. after `degraded`.
    pub fn refresh(&mut self) -> Result<()> {
        if self.owner.is_none() {
            return Err(self.fail(EngineError::NoSession));
        }
        if self.store.is_none() {
            return Err(self.fail(EngineError::StoreUnavailable(
                "no remote store configured".into(),
            )));
        }
        self.load();
        if self.status == SessionStatus::Degraded {
            return Err(EngineError::StoreUnavailable(format!(
                "could not load data for {}",
                self.owner.as_ref().map_or("nobody".to_string(), Owner::to_string)
            )));
        }
        Ok(())
    }

    /// Apply any live update pushed by the backend. Returns true when the
    /// task view changed.
    pub fn poll(&mut self) -> bool {
        let Some(store) = self.store.as_deref_mut() else {
            return false;
        };
        match store.poll_changes() {
            Some(mut tasks) => {
                tracing::debug!(count = tasks.len(), pending = self.pending.len(), "applied live task update");
                self.pending.overlay(&mut tasks);
                self.tasks = tasks;
                true
            }
            None => false,
        }
    }

    /// End the session and hand back the context for persisting settings.
    pub fn shutdown(mut self) -> SessionContext {
        self.teardown();
        self.context
    }

    fn load(&mut self) {
        self.set_status(SessionStatus::Loading);
        let Some(store) = self.store.as_deref_mut() else {
            return;
        };
        if !self.pending.is_empty() {
            if let Err((operation, e)) = self.pending.flush(store, &self.progress) {
                tracing::warn!(operation, error = %e, pending = self.pending.len(), "queued writes still undelivered");
            }
        }

        let loaded = store
            .list()
            .and_then(|tasks| store.load_progress().map(|progress| (tasks, progress)));
        match loaded {
            Ok((mut tasks, progress)) => {
                tracing::info!(owner = %store.owner(), tasks = tasks.len(), level = progress.level, "session loaded");
                self.pending.overlay(&mut tasks);
                self.tasks = tasks;
                if !self.pending.progress {
                    self.progress = progress;
                }
                let status = if self.is_guest() {
                    SessionStatus::Guest
                } else {
                    SessionStatus::Authenticated
                };
                self.flush_deferred("initialize progress");
                self.set_status(status);
            }
            Err(e) => {
                self.fail(EngineError::from_read(e));
                self.set_status(SessionStatus::Degraded);
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(store) = self.store.take() {
            if !self.pending.is_empty() {
                tracing::warn!(owner = %store.owner(), pending = self.pending.len(), "discarding undelivered writes");
            }
            tracing::info!(owner = %store.owner(), "session ended");
        }
        self.pending = PendingWrites::default();
        self.owner = None;
        self.tasks.clear();
        self.progress = Progress::default();
        self.context.end();
    }

    fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.events.push(Event::SessionChanged {
            status,
            guest: status == SessionStatus::Guest,
            at: Utc::now(),
        });
    }

    // ── Task operations ─────────────────────────────────────────────

    pub fn add_task(&mut self, draft: TaskDraft) -> Result<Task> {
        let draft = self.validated(draft)?;
        let result = self.active_store()?.add(draft);
        let task = result.map_err(|e| self.fail(EngineError::from_write("add task", e)))?;

        if !self.tasks.iter().any(|t| t.id() == task.id()) {
            self.tasks.insert(0, task.clone());
        }
        self.events.push(Event::TaskAdded {
            task_id: task.id().to_string(),
            title: task.title.clone(),
            at: Utc::now(),
        });
        self.flush_deferred("add task");
        Ok(task)
    }

    /// Replace the user-editable fields of a task. Identity, creation time
    /// and reward state are carried over untouched.
    pub fn edit_task(&mut self, id: &str, draft: TaskDraft) -> Result<Task> {
        let draft = self.validated(draft)?;
        self.active_store()?;
        let idx = self.index_of(id)?;

        self.tasks[idx].apply_edit(draft);
        let updated = self.tasks[idx].clone();
        self.pending
            .tasks
            .insert(id.to_string(), PendingWrite::Update(updated.clone()));
        self.write_pending()?;

        self.events.push(Event::TaskUpdated {
            task_id: updated.id().to_string(),
            title: updated.title.clone(),
            at: Utc::now(),
        });
        self.flush_deferred("edit task");
        Ok(updated)
    }

    /// Set a task's completion flag, awarding XP on the first completion.
    ///
    /// The task record (with its reward marker) is written before progress,
    /// so a crash between the two can lose XP but never pay it twice. When
    /// the task is already in the requested state, any undelivered writes
    /// are retried instead.
    pub fn set_completed(&mut self, id: &str, completed: bool) -> Result<CompletionOutcome> {
        self.active_store()?;
        let idx = self.index_of(id)?;
        let outcome = on_completion_toggle(&self.tasks[idx], completed, self.progress, Utc::now());
        if !outcome.changed {
            if !self.pending.is_empty() {
                self.write_pending()?;
            }
            return Ok(outcome);
        }

        self.tasks[idx] = outcome.task.clone();
        self.progress = outcome.progress;
        self.pending
            .tasks
            .insert(id.to_string(), PendingWrite::Update(outcome.task.clone()));
        if outcome.award.is_some() {
            self.pending.progress = true;
        }
        self.write_pending()?;

        let now = Utc::now();
        if outcome.fresh_completion {
            self.events.push(Event::TaskCompleted {
                task_id: id.to_string(),
                title: outcome.task.title.clone(),
                xp_gained: outcome.award.map(|a| a.xp_gained),
                at: now,
            });
        } else {
            self.events.push(Event::TaskReopened {
                task_id: id.to_string(),
                at: now,
            });
        }
        if let Some(award) = outcome.award.filter(|a| a.leveled_up) {
            tracing::info!(level = award.new_level, "level up");
            self.events.push(Event::LevelUp {
                new_level: award.new_level,
                at: now,
            });
        }
        self.flush_deferred("update task");
        Ok(outcome)
    }

    pub fn toggle_complete(&mut self, id: &str) -> Result<CompletionOutcome> {
        self.active_store()?;
        let idx = self.index_of(id)?;
        let completed = !self.tasks[idx].completed();
        self.set_completed(id, completed)
    }

    pub fn delete_task(&mut self, id: &str) -> Result<Task> {
        self.active_store()?;
        let idx = self.index_of(id)?;
        let removed = self.tasks.remove(idx);
        self.pending.tasks.insert(id.to_string(), PendingWrite::Remove);
        self.write_pending()?;

        self.events.push(Event::TaskDeleted {
            task_id: removed.id().to_string(),
            title: removed.title.clone(),
            at: Utc::now(),
        });
        self.flush_deferred("delete task");
        Ok(removed)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Log an error, queue its event and hand it back for returning.
    fn fail(&mut self, err: EngineError) -> EngineError {
        tracing::warn!(kind = ?err.kind(), error = %err, "operation failed");
        self.events.push(Event::Error {
            kind: err.kind(),
            message: err.to_string(),
            at: Utc::now(),
        });
        err
    }

    fn validated(&mut self, draft: TaskDraft) -> Result<TaskDraft> {
        draft.validate().map_err(|e| self.fail(e.into()))
    }

    fn active_store(&mut self) -> Result<&mut (dyn TaskStore + 'static)> {
        if self.owner.is_none() {
            return Err(self.fail(EngineError::NoSession));
        }
        if self.store.is_none() {
            return Err(self.fail(EngineError::StoreUnavailable(
                "no task store for the current owner".into(),
            )));
        }
        self.store.as_deref_mut().ok_or(EngineError::NoSession)
    }

    /// Push the write queue to the active store.
    fn write_pending(&mut self) -> Result<()> {
        let result = match self.store.as_deref_mut() {
            Some(store) => self.pending.flush(store, &self.progress),
            None => Ok(()),
        };
        result.map_err(|(operation, e)| self.fail(EngineError::from_write(operation, e)))
    }

    fn index_of(&mut self, id: &str) -> Result<usize> {
        match self.tasks.iter().position(|t| t.id() == id) {
            Some(idx) => Ok(idx),
            None => Err(self.fail(EngineError::NotFound(id.to_string()))),
        }
    }

    /// Report a fire-and-forget write that failed after returning `Ok`.
    fn flush_deferred(&mut self, operation: &'static str) {
        let deferred = self
            .store
            .as_deref_mut()
            .and_then(|store| store.take_deferred_error());
        if let Some(err) = deferred {
            self.fail(EngineError::from_write(operation, err));
        }
    }
}
