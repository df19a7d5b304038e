//! Integration tests for the session controller over both backends.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use heroic_core::backend::{Subscription, GUEST_PROFILE_KEY, GUEST_TASKS_KEY};
use heroic_core::{
    Database, ErrorKind, Event, Identity, MemoryRemoteStore, MemorySlots, Priority, Progress,
    RemoteStore, SessionContext, SessionController, SessionStatus, SlotStorage, StoreError, Task,
    TaskDraft,
};

fn controller(slots: Rc<MemorySlots>, remote: Option<Arc<MemoryRemoteStore>>) -> SessionController {
    let remote = remote.map(|r| r as Arc<dyn RemoteStore>);
    SessionController::new(SessionContext::default(), slots, remote)
}

fn sign_in(session: &mut SessionController, user: &str) {
    session.on_identity_changed(Identity::SignedIn {
        user_id: user.to_string(),
    });
}

/// Remote store whose progress document can be made read-only while task
/// writes keep working.
#[derive(Default)]
struct ProgressOutage {
    inner: MemoryRemoteStore,
    progress_down: AtomicBool,
}

impl RemoteStore for ProgressOutage {
    fn name(&self) -> &str {
        "progress-outage"
    }

    fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        self.inner.list_tasks(owner)
    }

    fn add_task(&self, owner: &str, draft: &TaskDraft) -> Result<Task, StoreError> {
        self.inner.add_task(owner, draft)
    }

    fn update_task(&self, owner: &str, task: &Task) -> Result<(), StoreError> {
        self.inner.update_task(owner, task)
    }

    fn delete_task(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete_task(owner, id)
    }

    fn get_progress(&self, owner: &str) -> Result<Option<Progress>, StoreError> {
        self.inner.get_progress(owner)
    }

    fn set_progress(&self, owner: &str, progress: &Progress) -> Result<(), StoreError> {
        if self.progress_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("progress document offline".into()));
        }
        self.inner.set_progress(owner, progress)
    }

    fn subscribe(&self, owner: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(owner)
    }
}

fn error_kinds(events: &[Event]) -> Vec<ErrorKind> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Error { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

#[test]
fn test_guest_session_persists_across_restarts() {
    let slots = Rc::new(MemorySlots::new());

    let mut session = controller(slots.clone(), None);
    assert!(session.enter_guest());
    assert_eq!(session.status(), SessionStatus::Guest);
    let task = session
        .add_task(TaskDraft::new("  Rescue the cat  ").with_priority(Priority::Medium))
        .unwrap();
    assert_eq!(task.title, "Rescue the cat");
    assert!(task.id().starts_with("local_"));
    session.set_completed(task.id(), true).unwrap();
    session.exit_guest();
    assert_eq!(session.status(), SessionStatus::SignedOut);
    assert!(session.tasks().is_empty());

    let stored = slots.read_slot(GUEST_TASKS_KEY).unwrap().unwrap();
    assert!(stored.contains("xpAwardedAt"));

    let mut restarted = controller(slots, None);
    restarted.enter_guest();
    assert_eq!(restarted.tasks().len(), 1);
    assert!(restarted.tasks()[0].completed());
    assert_eq!(restarted.progress(), Progress::new(10, 1));
}

#[test]
fn test_award_happens_once_across_toggles() {
    let mut session = controller(Rc::new(MemorySlots::new()), None);
    session.enter_guest();
    let task = session
        .add_task(TaskDraft::new("Recharge").with_priority(Priority::High))
        .unwrap();

    let first = session.set_completed(task.id(), true).unwrap();
    assert_eq!(first.award.map(|a| a.xp_gained), Some(15));

    let repeat = session.set_completed(task.id(), true).unwrap();
    assert!(!repeat.changed);

    session.toggle_complete(task.id()).unwrap();
    let again = session.toggle_complete(task.id()).unwrap();
    assert!(again.fresh_completion);
    assert!(again.award.is_none());
    assert_eq!(session.progress(), Progress::new(15, 1));

    let completions: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            Event::TaskCompleted { xp_gained, .. } => Some(xp_gained),
            _ => None,
        })
        .collect();
    assert_eq!(completions, vec![Some(15), None]);
}

#[test]
fn test_legacy_task_without_xp_earned_pays_default() {
    let slots = Rc::new(MemorySlots::new());
    slots
        .write_slot(
            GUEST_TASKS_KEY,
            r#"[{"id":"old","title":"Legacy","completed":false,"createdAt":"2025-01-01T00:00:00Z","priority":"high"}]"#,
        )
        .unwrap();
    slots
        .write_slot(GUEST_PROFILE_KEY, r#"{"xp":45,"level":1}"#)
        .unwrap();

    let mut session = controller(slots, None);
    session.enter_guest();
    let outcome = session.set_completed("old", true).unwrap();
    assert_eq!(outcome.award.map(|a| a.xp_gained), Some(10));
    assert_eq!(session.progress(), Progress::new(5, 2));
    assert!(session
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::LevelUp { new_level: 2, .. })));
}

#[test]
fn test_edit_keeps_identity_and_reward_state() {
    let mut session = controller(Rc::new(MemorySlots::new()), None);
    session.enter_guest();
    let task = session.add_task(TaskDraft::new("Draft")).unwrap();
    session.set_completed(task.id(), true).unwrap();
    let before = session.task(task.id()).unwrap().clone();

    let draft = TaskDraft::new("Final")
        .with_priority(Priority::High)
        .due_on(NaiveDate::from_ymd_opt(2026, 12, 24).unwrap())
        .at_time(NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    let edited = session.edit_task(task.id(), draft).unwrap();

    assert_eq!(edited.title, "Final");
    assert_eq!(edited.priority, Priority::High);
    assert_eq!(edited.id(), before.id());
    assert_eq!(edited.created_at(), before.created_at());
    assert_eq!(edited.xp_earned(), before.xp_earned());
    assert_eq!(edited.xp_awarded_at(), before.xp_awarded_at());
    assert!(edited.completed());
}

#[test]
fn test_missing_ids_report_not_found() {
    let mut session = controller(Rc::new(MemorySlots::new()), None);
    session.enter_guest();
    session.drain_events();

    assert_eq!(
        session.set_completed("nope", true).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(session.delete_task("nope").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        error_kinds(&session.drain_events()),
        vec![ErrorKind::NotFound, ErrorKind::NotFound]
    );
}

#[test]
fn test_guest_and_user_views_never_mix() {
    let slots = Rc::new(MemorySlots::new());
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = controller(slots, Some(remote.clone()));

    session.enter_guest();
    session.add_task(TaskDraft::new("guest only")).unwrap();

    sign_in(&mut session, "hero");
    assert_eq!(session.status(), SessionStatus::Authenticated);
    assert!(!session.is_guest());
    assert!(session.tasks().is_empty());

    let remote_task = session.add_task(TaskDraft::new("remote only")).unwrap();
    assert!(!remote_task.id().starts_with("local_"));
    assert_eq!(remote.task_count("hero"), 1);
    assert_eq!(remote.stored_progress("hero"), Some(Progress::default()));

    assert!(!session.enter_guest());
    session.sign_out();
    assert_eq!(session.status(), SessionStatus::SignedOut);

    assert!(session.enter_guest());
    let titles: Vec<_> = session.tasks().iter().map(|t| t.title.clone()).collect();
    assert_eq!(titles, vec!["guest only".to_string()]);
}

#[test]
fn test_live_updates_and_unsubscribe_on_sign_out() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote.clone()));
    sign_in(&mut session, "hero");
    assert_eq!(remote.subscriber_count("hero"), 1);
    assert!(!session.poll());

    let other_device = Task::from_draft("from-phone", Utc::now(), TaskDraft::new("Phone task"));
    remote.seed_task("hero", other_device);
    assert!(session.poll());
    assert_eq!(session.tasks()[0].id(), "from-phone");
    assert!(!session.poll());

    session.on_identity_changed(Identity::SignedOut);
    assert_eq!(remote.subscriber_count("hero"), 0);
    assert!(session.tasks().is_empty());
}

#[test]
fn test_switching_users_releases_previous_subscription() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote.clone()));
    sign_in(&mut session, "alice");
    session.add_task(TaskDraft::new("alice's")).unwrap();

    sign_in(&mut session, "bob");
    assert_eq!(remote.subscriber_count("alice"), 0);
    assert_eq!(remote.subscriber_count("bob"), 1);
    assert!(session.tasks().is_empty());
}

#[test]
fn test_unreachable_remote_degrades_then_recovers() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.set_available(false);
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote.clone()));

    sign_in(&mut session, "hero");
    assert_eq!(session.status(), SessionStatus::Degraded);
    assert_eq!(
        error_kinds(&session.drain_events()),
        vec![ErrorKind::StoreUnavailable]
    );
    assert!(session.refresh().is_err());

    remote.set_available(true);
    session.refresh().unwrap();
    assert_eq!(session.status(), SessionStatus::Authenticated);
    assert_eq!(remote.subscriber_count("hero"), 1);
}

#[test]
fn test_degraded_keeps_last_known_data() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote.clone()));
    sign_in(&mut session, "hero");
    session.add_task(TaskDraft::new("cached")).unwrap();

    remote.set_available(false);
    assert!(session.refresh().is_err());
    assert_eq!(session.status(), SessionStatus::Degraded);
    assert_eq!(session.tasks().len(), 1);
}

#[test]
fn test_failed_remote_write_keeps_optimistic_state() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote.clone()));
    sign_in(&mut session, "hero");
    let task = session.add_task(TaskDraft::new("fragile")).unwrap();
    session.drain_events();

    remote.set_fail_writes(true);
    let err = session.set_completed(task.id(), true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailed);
    assert_eq!(error_kinds(&session.drain_events()), vec![ErrorKind::WriteFailed]);

    // In-memory task keeps its reward marker, so a retry cannot pay twice.
    assert!(session.task(task.id()).unwrap().is_rewarded());
    assert_eq!(remote.stored_progress("hero"), Some(Progress::default()));

    remote.set_fail_writes(false);
    let retry = session.set_completed(task.id(), true).unwrap();
    assert!(!retry.changed);
    assert_eq!(session.progress(), Progress::new(5, 1));
    assert_eq!(remote.stored_progress("hero"), Some(Progress::new(5, 1)));
    assert_eq!(session.pending_writes(), 0);
}

#[test]
fn test_live_update_after_failed_write_cannot_pay_twice() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote.clone()));
    sign_in(&mut session, "hero");
    let task = session.add_task(TaskDraft::new("fragile")).unwrap();

    remote.set_fail_writes(true);
    assert!(session.set_completed(task.id(), true).is_err());
    assert_eq!(session.progress(), Progress::new(5, 1));
    assert_eq!(session.pending_writes(), 2);

    remote.set_fail_writes(false);
    session.add_task(TaskDraft::new("two")).unwrap();
    assert!(session.poll());

    // The backend copy is still incomplete; the queued write wins.
    let seen = session.task(task.id()).unwrap();
    assert!(seen.completed());
    assert!(seen.is_rewarded());
    assert_eq!(session.progress(), Progress::new(5, 1));

    let again = session.set_completed(task.id(), true).unwrap();
    assert!(again.award.is_none());
    assert_eq!(remote.stored_progress("hero"), Some(Progress::new(5, 1)));
    assert_eq!(session.pending_writes(), 0);

    session.refresh().unwrap();
    assert!(session.task(task.id()).unwrap().is_rewarded());
    assert_eq!(session.progress(), Progress::new(5, 1));
}

#[test]
fn test_failed_progress_save_survives_refresh() {
    let remote = Arc::new(ProgressOutage::default());
    let mut session = SessionController::new(
        SessionContext::default(),
        Rc::new(MemorySlots::new()),
        Some(remote.clone() as Arc<dyn RemoteStore>),
    );
    sign_in(&mut session, "hero");
    let task = session
        .add_task(TaskDraft::new("half saved").with_priority(Priority::High))
        .unwrap();
    session.drain_events();

    remote.progress_down.store(true, Ordering::SeqCst);
    let err = session.set_completed(task.id(), true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailed);
    assert_eq!(session.pending_writes(), 1);
    assert_eq!(remote.inner.stored_progress("hero"), Some(Progress::default()));

    // Task record landed with its marker; the credited XP must not be lost.
    session.refresh().unwrap();
    assert!(session.task(task.id()).unwrap().is_rewarded());
    assert_eq!(session.progress(), Progress::new(15, 1));

    remote.progress_down.store(false, Ordering::SeqCst);
    session.refresh().unwrap();
    assert_eq!(session.pending_writes(), 0);
    assert_eq!(remote.inner.stored_progress("hero"), Some(Progress::new(15, 1)));
}

#[test]
fn test_undelivered_delete_stays_hidden_from_live_updates() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote.clone()));
    sign_in(&mut session, "hero");
    let doomed = session.add_task(TaskDraft::new("doomed")).unwrap();

    remote.set_fail_writes(true);
    assert!(session.delete_task(doomed.id()).is_err());
    assert!(session.task(doomed.id()).is_none());

    let other_device = Task::from_draft("from-phone", Utc::now(), TaskDraft::new("Phone task"));
    remote.seed_task("hero", other_device);
    assert!(session.poll());
    let ids: Vec<_> = session.tasks().iter().map(|t| t.id().to_string()).collect();
    assert_eq!(ids, vec!["from-phone".to_string()]);

    remote.set_fail_writes(false);
    session.refresh().unwrap();
    assert_eq!(remote.task_count("hero"), 1);
    assert_eq!(session.pending_writes(), 0);
}

#[test]
fn test_remote_progress_is_bootstrapped_and_normalized() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.seed_progress("veteran", Progress::new(130, 1));
    let mut session = controller(Rc::new(MemorySlots::new()), Some(remote));
    sign_in(&mut session, "veteran");
    // 130 at L1: 50 -> L2 (80 left), 75 -> L3 (5 left).
    assert_eq!(session.progress(), Progress::new(5, 3));
    assert_eq!(session.xp_to_next_level(), 112);
}

#[test]
fn test_guest_session_over_sqlite() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("heroic-tasks.db");

    {
        let slots = Rc::new(Database::open_at(&path).unwrap());
        let mut session = SessionController::new(SessionContext::new(true), slots, None);
        session.enter_guest();
        session.add_task(TaskDraft::new("On disk")).unwrap();
    }

    let slots = Rc::new(Database::open_at(&path).unwrap());
    let mut session = SessionController::new(SessionContext::default(), slots, None);
    session.enter_guest();
    assert_eq!(session.tasks()[0].title, "On disk");
    assert_eq!(session.report().pending, 1);
}
