//! A task waiting on the user before it can be created

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::TaskInfo;
use crate::conflict::ConflictResult;
use crate::conversation::Expiring;

/// TaskInfo plus the decision the user still owes us
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    pub info: TaskInfo,
    /// Message that started the task, kept for preference learning
    pub message: String,
    pub awaiting_conflict_decision: bool,
    pub awaiting_calendar_selection: bool,
    pub awaiting_task_list_selection: bool,
    pub conflict: Option<ConflictResult>,
    pub last_activity: NaiveDateTime,
}

impl PendingTask {
    pub fn new(info: TaskInfo, message: impl Into<String>, now: NaiveDateTime) -> Self {
        Self {
            info,
            message: message.into(),
            awaiting_conflict_decision: false,
            awaiting_calendar_selection: false,
            awaiting_task_list_selection: false,
            conflict: None,
            last_activity: now,
        }
    }

    /// Whether any user decision is outstanding
    pub fn is_waiting(&self) -> bool {
        self.awaiting_conflict_decision || self.awaiting_calendar_selection || self.awaiting_task_list_selection
    }

    pub fn touch(&mut self, now: NaiveDateTime) {
        self.last_activity = now;
    }
}

impl Expiring for PendingTask {
    fn last_activity(&self) -> NaiveDateTime {
        self.last_activity
    }
}
