//! Task management commands for CLI.

use chrono::{NaiveDate, NaiveTime};
use clap::Subcommand;
use heroic_core::{Priority, TaskDraft};
use serde::Serialize;

use super::session;

type Output = Result<String, Box<dyn std::error::Error>>;

fn to_json<T: Serialize>(value: &T) -> Output {
    Ok(serde_json::to_string_pretty(value)?)
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Priority: low, medium or high (default: low)
        #[arg(long, default_value = "low")]
        priority: Priority,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Due time (HH:MM)
        #[arg(long, value_parser = parse_clock)]
        time: Option<NaiveTime>,
    },
    /// List tasks, newest first
    List {
        /// Only show incomplete tasks
        #[arg(long)]
        pending: bool,
    },
    /// Mark a task complete
    Done {
        /// Task ID
        id: String,
    },
    /// Mark a task incomplete
    Undo {
        /// Task ID
        id: String,
    },
    /// Flip a task's completion state
    Toggle {
        /// Task ID
        id: String,
    },
    /// Edit a task's title, priority or schedule
    Edit {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New priority
        #[arg(long)]
        priority: Option<Priority>,
        /// New due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        /// New due time (HH:MM)
        #[arg(long, value_parser = parse_clock, conflicts_with = "clear_time")]
        time: Option<NaiveTime>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Remove the due time
        #[arg(long)]
        clear_time: bool,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

fn parse_clock(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| format!("invalid time '{s}': {e}"))
}

pub fn run(action: TaskAction, user: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session::open(user)?;

    let result: Output = match action {
        TaskAction::Add {
            title,
            priority,
            due,
            time,
        } => {
            let draft = TaskDraft {
                title,
                due_date: due,
                time,
                priority,
            };
            session
                .add_task(draft)
                .map_err(Box::from)
                .and_then(|task| to_json(&task))
        }
        TaskAction::List { pending } => {
            let tasks: Vec<_> = session
                .tasks()
                .iter()
                .filter(|t| !pending || !t.completed())
                .collect();
            to_json(&tasks)
        }
        TaskAction::Done { id } => session
            .set_completed(&id, true)
            .map_err(Box::from)
            .and_then(|outcome| to_json(&outcome.task)),
        TaskAction::Undo { id } => session
            .set_completed(&id, false)
            .map_err(Box::from)
            .and_then(|outcome| to_json(&outcome.task)),
        TaskAction::Toggle { id } => session
            .toggle_complete(&id)
            .map_err(Box::from)
            .and_then(|outcome| to_json(&outcome.task)),
        TaskAction::Edit {
            id,
            title,
            priority,
            due,
            time,
            clear_due,
            clear_time,
        } => {
            let mut draft = session
                .task(&id)
                .map(|t| t.draft())
                .ok_or_else(|| format!("task not found: {id}"))?;
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(priority) = priority {
                draft.priority = priority;
            }
            if clear_due {
                draft.due_date = None;
            } else if due.is_some() {
                draft.due_date = due;
            }
            if clear_time {
                draft.time = None;
            } else if time.is_some() {
                draft.time = time;
            }
            session
                .edit_task(&id, draft)
                .map_err(Box::from)
                .and_then(|task| to_json(&task))
        }
        TaskAction::Delete { id } => session
            .delete_task(&id)
            .map(|task| format!("deleted {}", task.id()))
            .map_err(Box::from),
    };

    session::report_events(&mut session);
    println!("{}", result?);
    Ok(())
}
