//! TaskStore trait and query types

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::error::StoreError;
use crate::task::{DeletedRecord, Task, TaskType, TaskUpdate};

/// Query filter for `TaskStore::query_tasks`
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub user_id: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<NaiveDate>,
    /// Empty means any type
    pub task_types: Vec<TaskType>,
}

impl TaskFilter {
    /// All tasks of one user
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Unfinished tasks of one user
    pub fn open_for_user(user_id: impl Into<String>) -> Self {
        Self::for_user(user_id).with_completed(false)
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn of_types(mut self, types: &[TaskType]) -> Self {
        self.task_types = types.to_vec();
        self
    }

    /// Check a task against the filter
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(user_id) = &self.user_id
            && &task.user_id != user_id
        {
            return false;
        }
        if let Some(completed) = self.completed
            && task.completed != completed
        {
            return false;
        }
        if let Some(date) = self.due_date
            && task.due_date != Some(date)
        {
            return false;
        }
        self.task_types.is_empty() || self.task_types.contains(&task.task_type)
    }
}

/// Result ordering for `TaskStore::query_tasks`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskOrder {
    /// Insertion order
    Created,
    /// Due date (undated last), then start/due time, then insertion order
    #[default]
    Due,
}

/// Sort tasks in place the same way the SQL backend orders them
pub fn sort_tasks(tasks: &mut [Task], order: TaskOrder) {
    match order {
        TaskOrder::Created => tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))),
        TaskOrder::Due => tasks.sort_by(|a, b| {
            compare_option_last(&a.due_date, &b.due_date)
                .then_with(|| compare_option_last(&a.effective_start(), &b.effective_start()))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        }),
    }
}

fn compare_option_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Plain CRUD contract over task records
///
/// Implementations must be safe to share between tasks; every method takes
/// `&self` and synchronizes internally.
pub trait TaskStore: Send + Sync {
    /// Insert a task, returning the assigned stable id
    fn insert_task(&self, task: &Task) -> Result<i64, StoreError>;

    /// Fetch one task by id
    fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError>;

    /// Query tasks matching a filter in the given order
    fn query_tasks(&self, filter: &TaskFilter, order: TaskOrder) -> Result<Vec<Task>, StoreError>;

    /// Apply a partial update; returns false when no task has that id
    fn update_task_fields(&self, id: i64, update: &TaskUpdate) -> Result<bool, StoreError>;

    /// Delete a task; returns false when no task has that id
    fn delete_task(&self, id: i64) -> Result<bool, StoreError>;

    /// Keep a snapshot of a deleted task
    fn insert_deleted_record(&self, record: &DeletedRecord) -> Result<(), StoreError>;

    /// Deleted snapshots of one user, most recent first
    fn deleted_records(&self, user_id: &str) -> Result<Vec<DeletedRecord>, StoreError>;
}
