//! Task statistics for the user dashboard and project pages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Priority, Project, Task, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub by_priority: BTreeMap<String, usize>,
    /// Due before "now" and not completed.
    pub overdue: usize,
    /// Percentage of completed tasks, 0 for an empty list.
    pub completion: f64,
}

impl TaskStats {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn priority_count(&self, priority: Priority) -> usize {
        self.by_priority.get(priority.as_str()).copied().unwrap_or(0)
    }
}

/// Statistics of one project, shown next to the server-reported progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    pub project_id: i64,
    pub tasks: TaskStats,
    /// As reported by the server. Not reconciled with `tasks.completion`.
    pub reported_progress: f64,
}

pub fn task_stats<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: DateTime<Utc>) -> TaskStats {
    let mut stats = TaskStats {
        by_status: TaskStatus::ALL.iter().map(|s| (*s, 0)).collect(),
        ..Default::default()
    };
    for task in tasks {
        stats.total += 1;
        *stats.by_status.entry(task.status).or_default() += 1;
        *stats
            .by_priority
            .entry(task.priority.as_str().to_string())
            .or_default() += 1;
        if task.status != TaskStatus::Completed && task.due().is_some_and(|due| due < now) {
            stats.overdue += 1;
        }
    }
    if stats.total > 0 {
        stats.completion = stats.count(TaskStatus::Completed) as f64 * 100.0 / stats.total as f64;
    }
    stats
}

/// Statistics over the tasks assigned to `user_id`.
pub fn user_stats(user_id: i64, tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    task_stats(
        tasks.iter().filter(|t| t.assignee_id == Some(user_id)),
        now,
    )
}

pub fn project_stats(project: &Project, now: DateTime<Utc>) -> ProjectStats {
    ProjectStats {
        project_id: project.id,
        tasks: task_stats(&project.tasks, now),
        reported_progress: project.progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(id: i64, status: TaskStatus, priority: Priority, due: Option<&str>) -> Task {
        Task {
            id,
            title: format!("Task {}", id),
            description: None,
            status,
            priority,
            due_date: due.map(str::to_string),
            project_id: 1,
            assignee_id: Some(if id % 2 == 0 { 7 } else { 8 }),
            created_at: None,
            updated_at: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap()
    }

    fn sample() -> Vec<Task> {
        use Priority::*;
        use TaskStatus::*;
        vec![
            task(1, Pending, High, Some("2026-03-01")),
            task(2, Completed, High, Some("2026-03-01")),
            task(3, InProgress, Low, Some("2026-04-01")),
            task(4, Completed, Medium, None),
        ]
    }

    #[test]
    fn counts_statuses_priorities_and_overdue() {
        let stats = task_stats(&sample(), now());
        assert_eq!(stats.total, 4);
        assert_eq!(stats.count(TaskStatus::Completed), 2);
        assert_eq!(stats.count(TaskStatus::Pending), 1);
        assert_eq!(stats.priority_count(Priority::High), 2);
        assert_eq!(stats.priority_count(Priority::Unknown), 0);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completion, 50.0);
    }

    #[test]
    fn empty_list_has_zero_completion_and_all_statuses() {
        let stats = task_stats(&Vec::<Task>::new(), now());
        assert_eq!(stats.completion, 0.0);
        assert_eq!(stats.by_status.len(), TaskStatus::ALL.len());
    }

    #[test]
    fn user_stats_only_counts_assigned_tasks() {
        let stats = user_stats(7, &sample(), now());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completion, 100.0);
        assert_eq!(stats.overdue, 0);
    }

    #[test]
    fn project_progress_is_reported_as_is() {
        let project = Project {
            id: 3,
            name: "Launch".into(),
            description: None,
            status: None,
            priority: Priority::High,
            progress: 80.0,
            due_date: None,
            members: Vec::new(),
            tasks: sample(),
            created_at: None,
            updated_at: None,
        };
        let stats = project_stats(&project, now());
        assert_eq!(stats.reported_progress, 80.0);
        assert_eq!(stats.tasks.completion, 50.0);
    }
}
