//! Schedule conflict detection
//!
//! Advisory only: a conflict is reported with alternative start times and
//! the caller decides whether to proceed anyway.

mod detector;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

pub use detector::{BusyInterval, ConflictDetector, to_minutes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    Overlap,
    TooClose,
}

/// One existing entry that collides with the candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub task_id: i64,
    pub title: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Zero for too-close conflicts
    pub overlap_minutes: i64,
    pub kind: ConflictKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub has_conflict: bool,
    pub conflicts: Vec<Conflict>,
    pub suggested_times: Vec<NaiveTime>,
}

impl ConflictResult {
    pub fn none() -> Self {
        Self::default()
    }

    /// Reply text listing the conflicts and alternatives
    pub fn describe(&self) -> String {
        let mut lines = vec!["⚠️ Trùng lịch với:".to_string()];
        for c in &self.conflicts {
            let detail = match c.kind {
                ConflictKind::Overlap => format!("trùng {} phút", c.overlap_minutes),
                ConflictKind::TooClose => "quá sát giờ".to_string(),
            };
            lines.push(format!(
                "  • {} ({}-{}, {})",
                c.title,
                c.start.format("%H:%M"),
                c.end.format("%H:%M"),
                detail
            ));
        }
        if !self.suggested_times.is_empty() {
            let times: Vec<String> = self
                .suggested_times
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}. {}", i + 1, t.format("%H:%M")))
                .collect();
            lines.push(format!("Gợi ý giờ khác: {}", times.join(", ")));
        }
        lines.push("Trả lời \"vẫn tạo\" để giữ giờ này, chọn số hoặc giờ gợi ý, hoặc \"hủy\".".to_string());
        lines.join("\n")
    }
}
