//! Task records and the drafts used to create or edit them.
//!
//! A [`Task`] keeps its identity, creation time, XP value and reward gate
//! private: those are fixed by the store at creation and by the reward
//! ledger on completion, and editing must never touch them.

mod clock_time;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// XP paid out for records written before `xpEarned` existed.
pub const DEFAULT_XP_FOR_LEGACY_TASKS: u32 = 10;

/// Opaque task identifier, unique per owner.
pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    /// XP a task of this priority is worth, fixed at creation.
    pub fn xp_reward(self) -> u32 {
        match self {
            Priority::Low => 5,
            Priority::Medium => 10,
            Priority::High => 15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("expected low, medium or high, got '{other}'"),
            }),
        }
    }
}

/// User-editable task fields, used both for adding and for editing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "clock_time", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub priority: Priority,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn due_on(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn at_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Trim the title and reject blank ones.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if trimmed.len() != self.title.len() {
            self.title = trimmed.to_string();
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: TaskId,
    pub title: String,
    #[serde(default)]
    completed: bool,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "clock_time", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub priority: Priority,
    /// Absent on legacy records.
    #[serde(default)]
    xp_earned: Option<u32>,
    #[serde(default)]
    xp_awarded_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a fresh, incomplete task. Only stores call this: they own id
    /// assignment and creation timestamps.
    pub fn from_draft(id: impl Into<TaskId>, created_at: DateTime<Utc>, draft: TaskDraft) -> Self {
        Self {
            id: id.into(),
            title: draft.title,
            completed: false,
            created_at,
            due_date: draft.due_date,
            time: draft.time,
            priority: draft.priority,
            xp_earned: Some(draft.priority.xp_reward()),
            xp_awarded_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Stored XP value, `None` for legacy records.
    pub fn xp_earned(&self) -> Option<u32> {
        self.xp_earned
    }

    pub fn xp_awarded_at(&self) -> Option<DateTime<Utc>> {
        self.xp_awarded_at
    }

    /// Whether this task has already paid out.
    pub fn is_rewarded(&self) -> bool {
        self.xp_awarded_at.is_some()
    }

    /// XP to credit on first completion, with the legacy fallback applied.
    pub fn xp_reward(&self) -> u32 {
        match self.xp_earned {
            Some(xp) if xp > 0 => xp,
            _ => DEFAULT_XP_FOR_LEGACY_TASKS,
        }
    }

    /// Current editable fields as a draft, e.g. to prefill an edit form.
    pub fn draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            due_date: self.due_date,
            time: self.time,
            priority: self.priority,
        }
    }

    /// Replace the editable fields. Identity, creation time, completion,
    /// XP value and reward gate are left exactly as they were.
    pub fn apply_edit(&mut self, draft: TaskDraft) {
        self.title = draft.title;
        self.due_date = draft.due_date;
        self.time = draft.time;
        self.priority = draft.priority;
    }

    pub(crate) fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    pub(crate) fn mark_rewarded(&mut self, at: DateTime<Utc>) {
        if self.xp_awarded_at.is_none() {
            self.xp_awarded_at = Some(at);
        }
    }
}

/// Newest first, the order every backend lists in.
pub fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
