//! Reward ledger: turns completion transitions into XP exactly once.
//!
//! The `xpAwardedAt` marker on a task is the only thing consulted. Once it
//! is set, no sequence of uncomplete/recomplete or retried writes can mint
//! XP for that task again.

use chrono::{DateTime, Utc};

use crate::progress::{apply_xp, Progress};
use crate::task::Task;

/// XP credited by a single completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Award {
    pub xp_gained: u32,
    pub leveled_up: bool,
    pub new_level: u32,
}

/// Result of settling one completion toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Task record to persist (completion flag and reward gate applied).
    pub task: Task,
    /// Progress to persist. Equal to the input unless `award` is set.
    pub progress: Progress,
    pub award: Option<Award>,
    /// False -> true transition, whether or not it paid out.
    pub fresh_completion: bool,
    /// False when the requested state equals the current one.
    pub changed: bool,
}

/// Settle a request to set `task`'s completion flag to `completed`.
///
/// Only a false -> true transition on a task without `xpAwardedAt` awards
/// XP; the award and the marker are produced together so callers persist
/// them as one logical update. Uncompleting never reverses XP and never
/// clears the marker.
pub fn on_completion_toggle(
    task: &Task,
    completed: bool,
    progress: Progress,
    now: DateTime<Utc>,
) -> CompletionOutcome {
    let mut next = task.clone();

    if task.completed() == completed {
        return CompletionOutcome {
            task: next,
            progress,
            award: None,
            fresh_completion: false,
            changed: false,
        };
    }

    next.set_completed(completed);
    if !completed {
        tracing::debug!(task_id = task.id(), "task reopened");
        return CompletionOutcome {
            task: next,
            progress,
            award: None,
            fresh_completion: false,
            changed: true,
        };
    }

    if task.is_rewarded() {
        tracing::debug!(task_id = task.id(), "task recompleted, xp already awarded");
        return CompletionOutcome {
            task: next,
            progress,
            award: None,
            fresh_completion: true,
            changed: true,
        };
    }

    let xp_gained = task.xp_reward();
    let applied = apply_xp(progress, i64::from(xp_gained));
    next.mark_rewarded(now);
    tracing::debug!(
        task_id = task.id(),
        xp_gained,
        level = applied.progress.level,
        "task completed, xp awarded"
    );

    CompletionOutcome {
        task: next,
        progress: applied.progress,
        award: Some(Award {
            xp_gained,
            leveled_up: applied.leveled_up,
            new_level: applied.progress.level,
        }),
        fresh_completion: true,
        changed: true,
    }
}
