//! Task record
//!
//! Task is the single persisted record type. Dates and times are stored as
//! calendar values (no timezone); the owning user's local wall clock is
//! implied.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::now_ms;

/// Destination kind of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Plain to-do item, lives in a task list
    #[default]
    Task,
    /// Calendar event without other participants
    Calendar,
    /// Calendar event with attendees
    Meeting,
}

impl TaskType {
    /// Whether this type occupies a slot on the calendar
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Calendar | Self::Meeting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Calendar => "calendar",
            Self::Meeting => "meeting",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "task" | "todo" => Ok(Self::Task),
            "calendar" | "event" => Ok(Self::Calendar),
            "meeting" => Ok(Self::Meeting),
            other => Err(format!("unknown task type: '{}'", other)),
        }
    }
}

/// A persisted task or calendar entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier assigned by the store (0 until inserted)
    pub id: i64,

    /// Owning user
    pub user_id: String,

    /// Human-readable title
    pub title: String,

    pub description: Option<String>,

    pub due_date: Option<NaiveDate>,

    pub due_time: Option<NaiveTime>,

    pub start_time: Option<NaiveTime>,

    pub end_time: Option<NaiveTime>,

    pub location: Option<String>,

    /// Ordered list of free-text names or emails
    #[serde(default)]
    pub attendees: Vec<String>,

    pub task_type: TaskType,

    pub calendar_id: Option<String>,

    pub task_list_id: Option<String>,

    /// Identifier returned by the external calendar/task service
    pub external_id: Option<String>,

    pub completed: bool,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Task {
    /// Create a new unsaved task
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, task_type: TaskType) -> Self {
        let now = now_ms();
        Self {
            id: 0,
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            due_date: None,
            due_time: None,
            start_time: None,
            end_time: None,
            location: None,
            attendees: Vec::new(),
            task_type,
            calendar_id: None,
            task_list_id: None,
            external_id: None,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the due date
    pub fn with_due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    /// Set start and optional end time
    pub fn with_times(mut self, start: NaiveTime, end: Option<NaiveTime>) -> Self {
        self.start_time = Some(start);
        self.end_time = end;
        self
    }

    /// Searchable content: title followed by description
    pub fn content(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => format!("{} {}", self.title, desc),
            _ => self.title.clone(),
        }
    }

    /// Start of the scheduled slot, preferring the explicit start time
    pub fn effective_start(&self) -> Option<NaiveTime> {
        self.start_time.or(self.due_time)
    }
}

/// Partial update applied by `TaskStore::update_task_fields`
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub completed: Option<bool>,
    pub calendar_id: Option<String>,
    pub task_list_id: Option<String>,
    pub external_id: Option<String>,
}

impl TaskUpdate {
    /// Update that only marks the task completed
    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the set fields to a task, bumping `updated_at`
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(date) = self.due_date {
            task.due_date = Some(date);
        }
        if let Some(time) = self.due_time {
            task.due_time = Some(time);
        }
        if let Some(time) = self.start_time {
            task.start_time = Some(time);
        }
        if let Some(time) = self.end_time {
            task.end_time = Some(time);
        }
        if let Some(location) = &self.location {
            task.location = Some(location.clone());
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(id) = &self.calendar_id {
            task.calendar_id = Some(id.clone());
        }
        if let Some(id) = &self.task_list_id {
            task.task_list_id = Some(id.clone());
        }
        if let Some(id) = &self.external_id {
            task.external_id = Some(id.clone());
        }
        task.updated_at = now_ms();
    }
}

/// Snapshot of a task taken right before it was deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub task: Task,

    /// Deletion timestamp (Unix milliseconds)
    pub deleted_at: i64,
}

impl DeletedRecord {
    pub fn of(task: Task) -> Self {
        Self {
            task,
            deleted_at: now_ms(),
        }
    }
}
