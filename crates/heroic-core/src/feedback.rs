//! Presentation adapter: maps engine events to sound cues and toasts.
//!
//! The engine never plays anything itself. A front end drains events from
//! the session controller and the focus timer, then asks this module what
//! to play and what to show.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::events::Event;
use crate::session::{SessionContext, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum Cue {
    Click,
    Transform,
    Complete,
    LevelUp,
    CycleEnd { work: bool },
}

/// Sounds for one event. Empty when muted.
pub fn cues_for(event: &Event, context: &SessionContext) -> Vec<Cue> {
    if context.muted() {
        return Vec::new();
    }
    match event {
        Event::TaskAdded { .. } | Event::TimerStarted { .. } => vec![Cue::Transform],
        Event::TaskCompleted { .. } => vec![Cue::Complete],
        Event::LevelUp { .. } => vec![Cue::LevelUp],
        Event::CycleCompleted { finished, .. } => vec![Cue::CycleEnd {
            work: !finished.is_break(),
        }],
        Event::TaskUpdated { .. }
        | Event::TaskReopened { .. }
        | Event::TaskDeleted { .. }
        | Event::TimerPaused { .. }
        | Event::TimerReset { .. }
        | Event::TimerResetAll { .. }
        | Event::WorkDurationChanged { .. } => vec![Cue::Click],
        Event::SessionChanged { status, .. } if *status == SessionStatus::Guest => {
            vec![Cue::Click]
        }
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub destructive: bool,
}

impl Toast {
    fn info(title: String, description: impl Into<String>) -> Self {
        Self {
            title,
            description: description.into(),
            destructive: false,
        }
    }

    fn destructive(title: String, description: impl Into<String>) -> Self {
        Self {
            title,
            description: description.into(),
            destructive: true,
        }
    }
}

/// "Task Added" + guest + bang -> "Task Added (Guest)!"
fn title(base: &str, guest: bool, bang: bool) -> String {
    let mut title = base.to_string();
    if guest {
        title.push_str(" (Guest)");
    }
    if bang {
        title.push('!');
    }
    title
}

/// Toast for one event, if it warrants one.
pub fn toast_for(event: &Event, guest: bool) -> Option<Toast> {
    let toast = match event {
        Event::SessionChanged {
            status: SessionStatus::Guest,
            ..
        } => Toast::info(
            "Guest Mode Activated".into(),
            "Your progress in guest mode is saved locally.",
        ),
        Event::SessionChanged {
            status: SessionStatus::SignedOut,
            ..
        } => Toast::info("Logged Out".into(), "Hope to see you back soon, Hero!"),
        Event::TaskAdded { title: t, .. } => {
            Toast::info(title("Task Added", guest, true), format!("\"{t}\" is ready."))
        }
        Event::TaskUpdated { title: t, .. } => {
            Toast::info(title("Task Updated", guest, true), format!("\"{t}\" modified."))
        }
        Event::TaskDeleted { title: t, .. } => Toast::destructive(
            title("Task Removed", guest, false),
            format!("\"{t}\" has been cleared."),
        ),
        Event::TaskCompleted {
            xp_gained: Some(xp),
            ..
        } => Toast::info(title("Mission Accomplished", guest, true), format!("+{xp} XP.")),
        Event::LevelUp { new_level, .. } => Toast::info(
            title("LEVEL UP", guest, true),
            format!("You've reached Level {new_level}! Keep up the heroic work!"),
        ),
        Event::WorkDurationChanged { minutes, .. } => Toast::info(
            "Focus Time Updated".into(),
            format!("Focus time set to {minutes} minutes."),
        ),
        Event::Error { kind, message, .. } => match kind {
            ErrorKind::NoSession => Toast::destructive(
                "Not Logged In".into(),
                "Please log in or continue as guest to add tasks.",
            ),
            ErrorKind::StoreUnavailable => {
                Toast::destructive("Database Error".into(), message.clone())
            }
            ErrorKind::ValidationFailed => {
                Toast::destructive("Invalid Input".into(), message.clone())
            }
            ErrorKind::WriteFailed | ErrorKind::NotFound => {
                Toast::destructive("Error".into(), message.clone())
            }
        },
        _ => return None,
    };
    Some(toast)
}
