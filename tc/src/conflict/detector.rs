//! Interval classification and free-slot suggestion
//!
//! Times are handled as minutes since midnight; the working window is
//! half-open, [work_start, work_end).

use chrono::{NaiveDate, NaiveTime, Timelike};
use taskstore::{Task, TaskFilter, TaskOrder, TaskStore, TaskType};
use tracing::debug;

use super::{Conflict, ConflictKind, ConflictResult};
use crate::config::ConflictConfig;
use crate::domain::TaskInfo;
use crate::error::CoreResult;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Smallest step between two suggested starts
const MIN_SUGGESTION_STEP: i64 = 30;

pub fn to_minutes(time: NaiveTime) -> i64 {
    (time.hour() * 60 + time.minute()) as i64
}

fn from_minutes(minutes: i64) -> Option<NaiveTime> {
    if !(0..MINUTES_PER_DAY).contains(&minutes) {
        return None;
    }
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
}

/// An existing entry occupying part of the day
#[derive(Debug, Clone, PartialEq)]
pub struct BusyInterval {
    pub task_id: i64,
    pub title: String,
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
}

impl BusyInterval {
    /// Interval of a stored task, if it has a time
    pub fn from_task(task: &Task) -> Option<Self> {
        Some(Self {
            task_id: task.id,
            title: task.title.clone(),
            start: task.effective_start()?,
            end: task.end_time,
        })
    }
}

pub struct ConflictDetector {
    config: ConflictConfig,
}

impl ConflictDetector {
    pub fn new(config: ConflictConfig) -> Self {
        Self { config }
    }

    /// End in minutes, defaulting to start + default duration
    fn end_minutes(&self, start: NaiveTime, end: Option<NaiveTime>) -> i64 {
        let start = to_minutes(start);
        match end.map(to_minutes) {
            Some(end) if end > start => end,
            _ => start + self.config.default_duration_minutes,
        }
    }

    /// Classify `existing` against the candidate and suggest alternatives
    pub fn detect(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: Option<NaiveTime>,
        existing: &[BusyInterval],
    ) -> ConflictResult {
        debug!(%date, %start, ?end, existing = existing.len(), "detect: called");
        let cs = to_minutes(start);
        let ce = self.end_minutes(start, end);
        let buffer = self.config.buffer_minutes;

        let mut conflicts = Vec::new();
        for busy in existing {
            let es = to_minutes(busy.start);
            let ee = self.end_minutes(busy.start, busy.end);
            let kind = if cs < ee && ce > es {
                ConflictKind::Overlap
            } else if (cs - ee).abs().min((es - ce).abs()) < buffer {
                ConflictKind::TooClose
            } else {
                continue;
            };
            let overlap_minutes = match kind {
                ConflictKind::Overlap => ce.min(ee) - cs.max(es),
                ConflictKind::TooClose => 0,
            };
            conflicts.push(Conflict {
                task_id: busy.task_id,
                title: busy.title.clone(),
                start: busy.start,
                end: from_minutes(ee).unwrap_or(busy.start),
                overlap_minutes,
                kind,
            });
        }

        if conflicts.is_empty() {
            return ConflictResult::none();
        }
        let suggested_times = self.suggest(ce - cs, existing);
        debug!(conflicts = conflicts.len(), ?suggested_times, "detect: conflicts found");
        ConflictResult {
            has_conflict: true,
            conflicts,
            suggested_times,
        }
    }

    /// Starts inside the working window that keep a buffer around every entry
    fn suggest(&self, duration: i64, existing: &[BusyInterval]) -> Vec<NaiveTime> {
        let buffer = self.config.buffer_minutes;
        let window_start = to_minutes(self.config.work_start);
        let window_end = to_minutes(self.config.work_end);
        let step = duration.max(MIN_SUGGESTION_STEP);
        let max = self.config.max_suggestions;

        let mut busy: Vec<(i64, i64)> = existing
            .iter()
            .map(|b| (to_minutes(b.start), self.end_minutes(b.start, b.end)))
            .collect();
        busy.sort();

        let mut suggestions = Vec::new();
        let mut earliest = window_start;
        let push_slots = |from: i64, latest: i64, out: &mut Vec<i64>| {
            let mut slot = from;
            while slot <= latest && out.len() < max {
                out.push(slot);
                slot += step;
            }
        };

        for (es, ee) in &busy {
            // Gap before this entry must hold the event plus a trailing buffer
            let latest = (*es - buffer - duration).min(window_end - duration);
            push_slots(earliest, latest, &mut suggestions);
            earliest = earliest.max(ee + buffer);
        }
        push_slots(earliest, window_end - duration, &mut suggestions);

        if suggestions.is_empty() {
            return self.config.fallback_times.iter().take(max).copied().collect();
        }
        suggestions.into_iter().filter_map(from_minutes).collect()
    }

    /// Check a draft against the user's stored calendar entries for the day
    ///
    /// Returns None when the draft is not a timed calendar entry.
    pub fn check(&self, info: &TaskInfo, user_id: &str, store: &dyn TaskStore) -> CoreResult<Option<ConflictResult>> {
        let (Some(date), Some(start)) = (info.due_date, info.time()) else {
            return Ok(None);
        };
        if !info.task_type.is_scheduled() {
            return Ok(None);
        }
        let filter = TaskFilter::open_for_user(user_id)
            .on_date(date)
            .of_types(&[TaskType::Calendar, TaskType::Meeting]);
        let existing: Vec<BusyInterval> = store
            .query_tasks(&filter, TaskOrder::Due)?
            .iter()
            .filter_map(BusyInterval::from_task)
            .collect();
        Ok(Some(self.detect(date, start, info.end_time, &existing)))
    }
}
