//! Progress report: task totals, level standing and completions per day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::progress::{Progress, Rank};
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCompletions {
    pub date: NaiveDate,
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub level: u32,
    pub xp: u64,
    pub xp_to_next_level: u64,
    pub rank: Rank,
    /// Completed tasks grouped by the day they were created, oldest first.
    pub completions_by_day: Vec<DailyCompletions>,
}

pub fn build_report(tasks: &[Task], progress: Progress) -> Report {
    let completed = tasks.iter().filter(|t| t.completed()).count();

    let mut by_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for task in tasks.iter().filter(|t| t.completed()) {
        *by_day.entry(task.created_at().date_naive()).or_default() += 1;
    }

    Report {
        total: tasks.len(),
        completed,
        pending: tasks.len() - completed,
        level: progress.level,
        xp: progress.xp,
        xp_to_next_level: progress.xp_to_next_level(),
        rank: progress.rank(),
        completions_by_day: by_day
            .into_iter()
            .map(|(date, completed)| DailyCompletions { date, completed })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::on_completion_toggle;
    use crate::task::TaskDraft;
    use chrono::{TimeZone, Utc};

    fn task_on(day: u32, hour: u32, completed: bool) -> Task {
        let created = Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0).unwrap();
        let task = Task::from_draft(format!("t{day}{hour}"), created, TaskDraft::new("t"));
        if completed {
            on_completion_toggle(&task, true, Progress::default(), created).task
        } else {
            task
        }
    }

    #[test]
    fn empty_report() {
        let report = build_report(&[], Progress::default());
        assert_eq!(report.total, 0);
        assert_eq!(report.xp_to_next_level, 50);
        assert_eq!(report.rank, Rank::RookiePlumber);
        assert!(report.completions_by_day.is_empty());
    }

    #[test]
    fn groups_completions_by_creation_day_ascending() {
        let tasks = vec![
            task_on(3, 9, true),
            task_on(1, 8, true),
            task_on(3, 17, true),
            task_on(2, 12, false),
        ];
        let report = build_report(&tasks, Progress::new(20, 3));
        assert_eq!(report.total, 4);
        assert_eq!(report.completed, 3);
        assert_eq!(report.pending, 1);
        assert_eq!(report.xp_to_next_level, 112);
        assert_eq!(
            report.completions_by_day,
            vec![
                DailyCompletions {
                    date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                    completed: 1
                },
                DailyCompletions {
                    date: NaiveDate::from_ymd_opt(2026, 5, 3).unwrap(),
                    completed: 2
                },
            ]
        );
    }
}
