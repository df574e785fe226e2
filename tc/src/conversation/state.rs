//! Slot-filling session state

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::store::Expiring;
use crate::domain::{TaskField, TaskInfo, TaskType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "field", rename_all = "snake_case")]
pub enum ConversationStage {
    AwaitingField(TaskField),
    AwaitingConfirmation,
    Complete,
    Cancelled,
}

impl ConversationStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }
}

/// Fields that must be filled (or skipped) before a task can be created
pub fn required_fields(task_type: TaskType) -> &'static [TaskField] {
    match task_type {
        TaskType::Task => &[TaskField::Title, TaskField::Date],
        TaskType::Calendar => &[TaskField::Title, TaskField::Date, TaskField::Time],
        TaskType::Meeting => &[TaskField::Title, TaskField::Date, TaskField::Time, TaskField::Attendees],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,
    pub stage: ConversationStage,
    pub info: TaskInfo,
    /// Fields the user declined to give
    pub skipped: BTreeSet<TaskField>,
    /// Message that opened the session
    pub message: String,
    pub last_activity: NaiveDateTime,
}

impl ConversationState {
    pub fn new(user_id: &str, info: TaskInfo, message: &str, now: NaiveDateTime) -> Self {
        Self {
            user_id: user_id.to_string(),
            stage: ConversationStage::AwaitingConfirmation,
            info,
            skipped: BTreeSet::new(),
            message: message.to_string(),
            last_activity: now,
        }
    }

    /// Required fields that are neither filled nor skipped, in asking order
    pub fn missing_fields(&self) -> Vec<TaskField> {
        required_fields(self.info.task_type)
            .iter()
            .copied()
            .filter(|f| !self.info.has(*f) && !self.skipped.contains(f))
            .collect()
    }

    pub fn touch(&mut self, now: NaiveDateTime) {
        self.last_activity = now;
    }
}

impl Expiring for ConversationState {
    fn last_activity(&self) -> NaiveDateTime {
        self.last_activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_fields_follow_type() {
        let info = TaskInfo {
            title: "Họp nhóm".to_string(),
            task_type: TaskType::Meeting,
            ..Default::default()
        };
        let mut state = ConversationState::new("u", info, "họp nhóm", now());
        assert_eq!(
            state.missing_fields(),
            vec![TaskField::Date, TaskField::Time, TaskField::Attendees]
        );

        state.info.due_date = NaiveDate::from_ymd_opt(2026, 10, 20);
        state.info.start_time = NaiveTime::from_hms_opt(9, 0, 0);
        state.skipped.insert(TaskField::Attendees);
        assert!(state.missing_fields().is_empty());
    }

    #[test]
    fn test_plain_task_needs_title_and_date() {
        let state = ConversationState::new("u", TaskInfo::default(), "", now());
        assert_eq!(state.missing_fields(), vec![TaskField::Title, TaskField::Date]);
    }
}
