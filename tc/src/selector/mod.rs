//! Calendar vs. task-list selection
//!
//! Static keyword rules first, then what the user taught us, then a content
//! heuristic. Low-confidence picks are turned into a question.

mod preferences;
mod rules;
mod target;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::conversation::Expiring;

pub use preferences::{PatternEntry, UserPreference};
pub use rules::pattern_key;
pub use target::TargetSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Calendar,
    TaskList,
}

impl TargetKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Calendar => "lịch",
            Self::TaskList => "danh sách công việc",
        }
    }
}

/// A calendar or task list the user can pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOption {
    pub id: String,
    pub name: String,
    pub kind: TargetKind,
    /// Primary calendar; replaces unavailable calendar ids
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    StaticRule,
    Learned,
    Fuzzy,
    Heuristic,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub calendar_id: Option<String>,
    pub task_list_id: Option<String>,
    pub confidence: f64,
    pub auto_selected: bool,
    pub source: SelectionSource,
    pub reasoning: String,
}

impl Selection {
    pub fn kind(&self) -> Option<TargetKind> {
        match (&self.calendar_id, &self.task_list_id) {
            (Some(_), _) => Some(TargetKind::Calendar),
            (None, Some(_)) => Some(TargetKind::TaskList),
            _ => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        self.calendar_id.as_deref().or(self.task_list_id.as_deref())
    }
}

/// Choice offered to the user, waiting for a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSelection {
    pub kind: TargetKind,
    pub options: Vec<SelectionOption>,
    /// Id the selector leaned towards
    pub suggested: Option<String>,
    pub last_activity: NaiveDateTime,
}

impl PendingSelection {
    pub fn new(kind: TargetKind, options: Vec<SelectionOption>, suggested: Option<String>, now: NaiveDateTime) -> Self {
        Self {
            kind,
            options,
            suggested,
            last_activity: now,
        }
    }

    /// Question listing the numbered options
    pub fn prompt(&self) -> String {
        let mut lines = vec![format!("Bạn muốn lưu vào {} nào?", self.kind.label())];
        for (i, option) in self.options.iter().enumerate() {
            let hint = if self.suggested.as_deref() == Some(option.id.as_str()) {
                " (gợi ý)"
            } else {
                ""
            };
            lines.push(format!("{}. {}{}", i + 1, option.name, hint));
        }
        lines.join("\n")
    }

    /// Option picked by number, id or name
    pub fn choose(&self, reply: &str) -> Option<&SelectionOption> {
        let reply = reply.trim();
        if let Ok(n) = reply.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| self.options.get(i));
        }
        let lowered = reply.to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        self.options
            .iter()
            .find(|o| o.id.to_lowercase() == lowered || o.name.to_lowercase() == lowered)
            .or_else(|| self.options.iter().find(|o| o.name.to_lowercase().contains(&lowered)))
    }
}

impl Expiring for PendingSelection {
    fn last_activity(&self) -> NaiveDateTime {
        self.last_activity
    }
}
