use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Task, TaskStatus};

/// Where a task sits on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub status: TaskStatus,
    pub index: usize,
}

/// Status buckets of one project's tasks.
///
/// Every status in [`TaskStatus::ALL`] always has a (possibly empty)
/// bucket, and every task lives in exactly one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    buckets: BTreeMap<TaskStatus, Vec<Task>>,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            buckets: TaskStatus::ALL.iter().map(|s| (*s, Vec::new())).collect(),
        }
    }
}

impl Board {
    /// Partition `tasks` by status, keeping the received order inside each
    /// bucket.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut board = Self::default();
        for task in tasks {
            board.bucket_mut(task.status).push(task);
        }
        board
    }

    fn bucket_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        self.buckets.entry(status).or_default()
    }

    pub fn bucket(&self, status: TaskStatus) -> &[Task] {
        self.buckets.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Buckets in column order.
    pub fn buckets(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        TaskStatus::ALL.into_iter().map(|s| (s, self.bucket(s)))
    }

    pub fn ids(&self, status: TaskStatus) -> Vec<i64> {
        self.bucket(status).iter().map(|t| t.id).collect()
    }

    /// Ids across all buckets in column order.
    pub fn all_ids(&self) -> Vec<i64> {
        self.buckets()
            .flat_map(|(_, tasks)| tasks.iter().map(|t| t.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn task(&self, task_id: i64) -> Option<&Task> {
        self.buckets
            .values()
            .flat_map(|tasks| tasks.iter())
            .find(|t| t.id == task_id)
    }

    pub fn placement_of(&self, task_id: i64) -> Option<Placement> {
        self.buckets().find_map(|(status, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|index| Placement { status, index })
        })
    }

    /// Move `task_id` from `from` to position `to_index` of `to` (clamped to
    /// the bucket length). Returns the placement the task had before the
    /// move, or `None` (board untouched) when the task is not in `from`.
    pub fn move_task(
        &mut self,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
        to_index: usize,
    ) -> Option<Placement> {
        let source = self.bucket_mut(from);
        let index = source.iter().position(|t| t.id == task_id)?;
        let mut task = source.remove(index);
        task.status = to;

        let target = self.bucket_mut(to);
        let to_index = to_index.min(target.len());
        target.insert(to_index, task);

        Some(Placement {
            status: from,
            index,
        })
    }

    /// Put `task_id` back at `origin`, wherever it currently is.
    /// Returns `false` when the task is no longer on the board.
    pub fn restore(&mut self, task_id: i64, origin: Placement) -> bool {
        let Some(current) = self.placement_of(task_id) else {
            return false;
        };
        let mut task = self.bucket_mut(current.status).remove(current.index);
        task.status = origin.status;
        let target = self.bucket_mut(origin.status);
        let index = origin.index.min(target.len());
        target.insert(index, task);
        true
    }
}
