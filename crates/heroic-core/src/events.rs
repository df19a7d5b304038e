use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::session::SessionStatus;
use crate::timer::CycleType;

/// Every state change in the engine produces an Event.
/// The UI drains them after each action and maps them to toasts and sounds;
/// the engine never depends on what the UI does with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionChanged {
        status: SessionStatus,
        guest: bool,
        at: DateTime<Utc>,
    },
    TaskAdded {
        task_id: String,
        title: String,
        at: DateTime<Utc>,
    },
    TaskUpdated {
        task_id: String,
        title: String,
        at: DateTime<Utc>,
    },
    /// Fresh false -> true completion. `xp_gained` is `None` when the task
    /// had already paid out on an earlier completion.
    TaskCompleted {
        task_id: String,
        title: String,
        xp_gained: Option<u32>,
        at: DateTime<Utc>,
    },
    TaskReopened {
        task_id: String,
        at: DateTime<Utc>,
    },
    TaskDeleted {
        task_id: String,
        title: String,
        at: DateTime<Utc>,
    },
    LevelUp {
        new_level: u32,
        at: DateTime<Utc>,
    },
    Error {
        kind: ErrorKind,
        message: String,
        at: DateTime<Utc>,
    },
    TimerStarted {
        cycle: CycleType,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// A cycle ran out and the timer moved on to `next` (stopped).
    CycleCompleted {
        finished: CycleType,
        next: CycleType,
        work_cycles: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        cycle: CycleType,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerResetAll {
        at: DateTime<Utc>,
    },
    WorkDurationChanged {
        minutes: u32,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerSnapshot {
        cycle: CycleType,
        running: bool,
        remaining_secs: u32,
        total_secs: u32,
        progress_pct: f64,
        work_cycles: u32,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable snake_case name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionChanged { .. } => "session_changed",
            Event::TaskAdded { .. } => "task_added",
            Event::TaskUpdated { .. } => "task_updated",
            Event::TaskCompleted { .. } => "task_completed",
            Event::TaskReopened { .. } => "task_reopened",
            Event::TaskDeleted { .. } => "task_deleted",
            Event::LevelUp { .. } => "level_up",
            Event::Error { .. } => "error",
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::CycleCompleted { .. } => "cycle_completed",
            Event::TimerReset { .. } => "timer_reset",
            Event::TimerResetAll { .. } => "timer_reset_all",
            Event::WorkDurationChanged { .. } => "work_duration_changed",
            Event::TimerSnapshot { .. } => "timer_snapshot",
        }
    }
}
