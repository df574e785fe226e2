//! TaskInfo - the structured form of a task extracted from a message

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use taskstore::{Task, TaskType};
use tracing::debug;

/// A slot that slot filling can ask for or an edit can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Title,
    Date,
    Time,
    EndTime,
    Attendees,
    Location,
    Description,
}

impl TaskField {
    /// User-facing field name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Title => "tiêu đề",
            Self::Date => "ngày",
            Self::Time => "giờ",
            Self::EndTime => "giờ kết thúc",
            Self::Attendees => "người tham dự",
            Self::Location => "địa điểm",
            Self::Description => "mô tả",
        }
    }
}

impl std::fmt::Display for TaskField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Title => "title",
            Self::Date => "date",
            Self::Time => "time",
            Self::EndTime => "end_time",
            Self::Attendees => "attendees",
            Self::Location => "location",
            Self::Description => "description",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TaskField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title" | "tiêu đề" | "tieude" | "ten" | "tên" => Ok(Self::Title),
            "date" | "day" | "ngày" | "ngay" | "deadline" => Ok(Self::Date),
            "time" | "start" | "giờ" | "gio" => Ok(Self::Time),
            "end" | "end_time" | "kết thúc" | "ket-thuc" => Ok(Self::EndTime),
            "attendees" | "people" | "with" | "người" | "nguoi" => Ok(Self::Attendees),
            "location" | "place" | "where" | "địa điểm" | "dia-diem" | "ở" => Ok(Self::Location),
            "description" | "desc" | "note" | "mô tả" | "ghi chú" => Ok(Self::Description),
            other => Err(format!("unknown field: '{}'", other)),
        }
    }
}

/// Subset of TaskInfo produced by one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill fields that are still unset from `other`
    pub fn merge(&mut self, other: ExtractedFields) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.description.is_none() {
            self.description = other.description;
        }
        if self.date.is_none() {
            self.date = other.date;
        }
        if self.start_time.is_none() {
            self.start_time = other.start_time;
        }
        if self.end_time.is_none() {
            self.end_time = other.end_time;
        }
        if self.location.is_none() {
            self.location = other.location;
        }
        for attendee in other.attendees {
            if !self.attendees.iter().any(|a| a.eq_ignore_ascii_case(&attendee)) {
                self.attendees.push(attendee);
            }
        }
        self.task_type = match (self.task_type, other.task_type) {
            (Some(a), Some(b)) => Some(stronger_type(a, b)),
            (a, b) => a.or(b),
        };
    }

    /// Whether this extraction carries a value for `field`
    pub fn provides(&self, field: TaskField) -> bool {
        match field {
            TaskField::Title => self.title.as_deref().is_some_and(|t| !t.trim().is_empty()),
            TaskField::Date => self.date.is_some(),
            TaskField::Time => self.start_time.is_some(),
            TaskField::EndTime => self.end_time.is_some(),
            TaskField::Attendees => !self.attendees.is_empty(),
            TaskField::Location => self.location.is_some(),
            TaskField::Description => self.description.is_some(),
        }
    }
}

/// Meeting outranks calendar, which outranks a plain task
fn stronger_type(a: TaskType, b: TaskType) -> TaskType {
    fn rank(t: TaskType) -> u8 {
        match t {
            TaskType::Task => 0,
            TaskType::Calendar => 1,
            TaskType::Meeting => 2,
        }
    }
    if rank(b) > rank(a) { b } else { a }
}

/// Structured representation of a task or event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Deadline time for plain tasks
    pub due_time: Option<NaiveTime>,
    /// Start time for calendar entries
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub task_type: TaskType,
    pub calendar_id: Option<String>,
    pub task_list_id: Option<String>,
}

impl TaskInfo {
    /// Build a TaskInfo from a fresh extraction
    pub fn from_fields(fields: &ExtractedFields) -> Self {
        let mut info = Self::default();
        info.apply(fields, true);
        info
    }

    /// Time of day the entry starts (or is due)
    pub fn time(&self) -> Option<NaiveTime> {
        self.start_time.or(self.due_time)
    }

    /// Whether `field` currently holds a value
    pub fn has(&self, field: TaskField) -> bool {
        match field {
            TaskField::Title => !self.title.trim().is_empty(),
            TaskField::Date => self.due_date.is_some(),
            TaskField::Time => self.time().is_some(),
            TaskField::EndTime => self.end_time.is_some(),
            TaskField::Attendees => !self.attendees.is_empty(),
            TaskField::Location => self.location.is_some(),
            TaskField::Description => self.description.is_some(),
        }
    }

    /// Set the time slot, routed by task type
    pub fn set_time(&mut self, time: NaiveTime) {
        if self.task_type.is_scheduled() {
            self.start_time = Some(time);
            self.due_time = None;
        } else {
            self.due_time = Some(time);
        }
    }

    /// Merge extracted fields into this TaskInfo
    ///
    /// Without `overwrite`, fields that already hold a value are kept. The
    /// task type may only be upgraded (task → calendar → meeting) unless
    /// overwriting. Returns the fields that changed.
    pub fn apply(&mut self, fields: &ExtractedFields, overwrite: bool) -> Vec<TaskField> {
        debug!(overwrite, ?fields, "TaskInfo::apply: called");
        let mut changed = Vec::new();

        if let Some(task_type) = fields.task_type {
            let next = if overwrite {
                task_type
            } else {
                stronger_type(self.task_type, task_type)
            };
            self.task_type = next;
        }
        self.normalize_times();

        if let Some(title) = fields.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
            && (overwrite || !self.has(TaskField::Title))
        {
            self.title = title.to_string();
            changed.push(TaskField::Title);
        }
        if let Some(description) = &fields.description
            && (overwrite || self.description.is_none())
        {
            self.description = Some(description.clone());
            changed.push(TaskField::Description);
        }
        if let Some(date) = fields.date
            && (overwrite || self.due_date.is_none())
        {
            self.due_date = Some(date);
            changed.push(TaskField::Date);
        }
        if let Some(time) = fields.start_time
            && (overwrite || self.time().is_none())
        {
            self.set_time(time);
            changed.push(TaskField::Time);
        }
        if let Some(end) = fields.end_time
            && (overwrite || self.end_time.is_none())
        {
            self.end_time = Some(end);
            changed.push(TaskField::EndTime);
        }
        if let Some(location) = &fields.location
            && (overwrite || self.location.is_none())
        {
            self.location = Some(location.clone());
            changed.push(TaskField::Location);
        }
        if !fields.attendees.is_empty() && (overwrite || self.attendees.is_empty()) {
            self.attendees = fields.attendees.clone();
            changed.push(TaskField::Attendees);
        }

        changed
    }

    /// Keep the time in the slot that matches the task type
    fn normalize_times(&mut self) {
        if self.task_type.is_scheduled() {
            if self.start_time.is_none() {
                self.start_time = self.due_time.take();
            }
        } else if self.due_time.is_none() {
            self.due_time = self.start_time.take();
        }
    }

    /// Convert into an unsaved store record
    pub fn to_task(&self, user_id: &str) -> Task {
        let mut task = Task::new(user_id, self.title.clone(), self.task_type);
        task.description = self.description.clone();
        task.due_date = self.due_date;
        task.due_time = self.due_time;
        task.start_time = self.start_time;
        task.end_time = self.end_time;
        task.location = self.location.clone();
        task.attendees = self.attendees.clone();
        task.calendar_id = self.calendar_id.clone();
        task.task_list_id = self.task_list_id.clone();
        task
    }

    /// One-line human summary used in replies
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("\"{}\"", self.title)];
        if let Some(date) = self.due_date {
            parts.push(date.format("%d/%m/%Y").to_string());
        }
        match (self.time(), self.end_time) {
            (Some(start), Some(end)) => parts.push(format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))),
            (Some(start), None) => parts.push(start.format("%H:%M").to_string()),
            _ => {}
        }
        if let Some(location) = &self.location {
            parts.push(format!("tại {}", location));
        }
        if !self.attendees.is_empty() {
            parts.push(format!("với {}", self.attendees.join(", ")));
        }
        parts.join(", ")
    }
}
