//! Per-user learned destinations

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::TargetKind;

/// Minimum count before a target can become the user's default
const MIN_PROMOTION_COUNT: u64 = 5;

/// Share of all selections a target must exceed to become the default
const PROMOTION_SHARE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub kind: TargetKind,
    pub target_id: String,
    pub count: u64,
    pub last_used: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub patterns: HashMap<String, PatternEntry>,
    pub default_calendar: Option<String>,
    pub default_task_list: Option<String>,
    pub total_selections: u64,
    /// Selections per target id, across all patterns
    pub target_counts: HashMap<String, u64>,
}

impl UserPreference {
    pub fn default_for(&self, kind: TargetKind) -> Option<&str> {
        match kind {
            TargetKind::Calendar => self.default_calendar.as_deref(),
            TargetKind::TaskList => self.default_task_list.as_deref(),
        }
    }

    /// Record one final choice for a pattern key
    ///
    /// A different target for a known key restarts its count. Keys beyond
    /// `max_patterns` are dropped least recently used first.
    pub fn record(&mut self, key: &str, kind: TargetKind, target_id: &str, now: NaiveDateTime, max_patterns: usize) {
        self.total_selections += 1;
        let entry = self.patterns.entry(key.to_string()).or_insert_with(|| PatternEntry {
            kind,
            target_id: target_id.to_string(),
            count: 0,
            last_used: now,
        });
        if entry.kind != kind || entry.target_id != target_id {
            debug!(%key, old = %entry.target_id, new = %target_id, "UserPreference::record: target changed");
            entry.kind = kind;
            entry.target_id = target_id.to_string();
            entry.count = 0;
        }
        entry.count += 1;
        entry.last_used = now;

        let target_count = self.target_counts.entry(target_id.to_string()).or_insert(0);
        *target_count += 1;
        let target_count = *target_count;

        let threshold = MIN_PROMOTION_COUNT.max((PROMOTION_SHARE * self.total_selections as f64).ceil() as u64);
        if target_count > threshold && self.default_for(kind) != Some(target_id) {
            info!(%target_id, ?kind, target_count, "UserPreference: promoted to default");
            match kind {
                TargetKind::Calendar => self.default_calendar = Some(target_id.to_string()),
                TargetKind::TaskList => self.default_task_list = Some(target_id.to_string()),
            }
        }

        while self.patterns.len() > max_patterns {
            let Some(oldest) = self
                .patterns
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            debug!(key = %oldest, "UserPreference::record: evicting pattern");
            self.patterns.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_counts_and_target_change() {
        let mut pref = UserPreference::default();
        pref.record("gym", TargetKind::Calendar, "personal", now(), 10);
        pref.record("gym", TargetKind::Calendar, "personal", now(), 10);
        assert_eq!(pref.patterns["gym"].count, 2);

        pref.record("gym", TargetKind::Calendar, "work", now(), 10);
        assert_eq!(pref.patterns["gym"].count, 1);
        assert_eq!(pref.patterns["gym"].target_id, "work");
        assert_eq!(pref.total_selections, 3);
    }

    #[test]
    fn test_default_promoted_after_passing_threshold() {
        let mut pref = UserPreference::default();
        for i in 0..5 {
            pref.record(&format!("key {}", i), TargetKind::Calendar, "work", now(), 10);
        }
        assert!(pref.default_calendar.is_none());

        pref.record("key 5", TargetKind::Calendar, "work", now(), 10);
        assert_eq!(pref.default_calendar.as_deref(), Some("work"));
        assert!(pref.default_task_list.is_none());
    }

    #[test]
    fn test_lru_bound() {
        let mut pref = UserPreference::default();
        for i in 0..5 {
            pref.record(&format!("k{}", i), TargetKind::TaskList, "todo", now() + Duration::minutes(i), 3);
        }
        assert_eq!(pref.patterns.len(), 3);
        assert!(!pref.patterns.contains_key("k0"));
        assert!(!pref.patterns.contains_key("k1"));
        assert!(pref.patterns.contains_key("k4"));
    }
}
