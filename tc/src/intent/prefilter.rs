//! Cheap first-pass screen that keeps chit-chat away from remote calls

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::temporal;
use super::vocab::{self, GREETINGS, QUESTIONS, TASK_INDICATORS};

/// Messages shorter than this (in characters) are never tasks
pub const MIN_TASK_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    LikelyTask,
    LikelyNotTask,
    Uncertain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefilterResult {
    pub verdict: Verdict,
    pub confidence: f64,
    pub reason: &'static str,
    /// Task-indicator terms found (a date or time counts as one)
    pub indicators: usize,
}

impl PrefilterResult {
    fn new(verdict: Verdict, confidence: f64, reason: &'static str, indicators: usize) -> Self {
        Self {
            verdict,
            confidence,
            reason,
            indicators,
        }
    }

    pub fn is_task_likely(&self) -> bool {
        self.verdict == Verdict::LikelyTask
    }
}

/// Whether the message starts with the command marker
pub fn is_command(message: &str) -> bool {
    message.trim_start().starts_with('/')
}

/// Screen a message by length, vocabulary and indicator count
pub fn prefilter(message: &str, today: NaiveDate) -> PrefilterResult {
    debug!(len = message.len(), "prefilter: called");
    let trimmed = message.trim();

    if trimmed.is_empty() {
        return PrefilterResult::new(Verdict::LikelyNotTask, 1.0, "empty message", 0);
    }
    if trimmed.chars().count() < MIN_TASK_CHARS {
        return PrefilterResult::new(Verdict::LikelyNotTask, 0.9, "message too short", 0);
    }
    if !trimmed.chars().any(char::is_alphanumeric) {
        return PrefilterResult::new(Verdict::LikelyNotTask, 0.95, "no words", 0);
    }

    let folded = vocab::fold(trimmed);
    let mut indicators = vocab::count_terms(&folded, TASK_INDICATORS);
    if !temporal::extract(trimmed, today).is_empty() {
        indicators += 1;
    }

    let is_greeting = vocab::contains_any(&folded, GREETINGS);
    let is_question = trimmed.ends_with('?') || vocab::contains_any(&folded, QUESTIONS);

    let result = if indicators == 0 && is_greeting {
        PrefilterResult::new(Verdict::LikelyNotTask, 0.85, "greeting", indicators)
    } else if indicators == 0 && is_question {
        PrefilterResult::new(Verdict::LikelyNotTask, 0.8, "question", indicators)
    } else if indicators >= 2 {
        PrefilterResult::new(Verdict::LikelyTask, 0.8, "several task indicators", indicators)
    } else if indicators == 1 {
        PrefilterResult::new(Verdict::LikelyTask, 0.6, "one task indicator", indicators)
    } else {
        PrefilterResult::new(Verdict::Uncertain, 0.5, "no signal", indicators)
    };
    debug!(verdict = ?result.verdict, confidence = result.confidence, "prefilter: done");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_empty_and_short() {
        let r = prefilter("   ", today());
        assert_eq!(r.verdict, Verdict::LikelyNotTask);
        assert_eq!(r.confidence, 1.0);

        let r = prefilter("ok", today());
        assert!(!r.is_task_likely());
        assert!(r.confidence >= 0.85);
    }

    #[test]
    fn test_emoji_only() {
        let r = prefilter("🙂🙂🙂 !!!", today());
        assert_eq!(r.verdict, Verdict::LikelyNotTask);
        assert_eq!(r.reason, "no words");
    }

    #[test]
    fn test_greeting_and_question() {
        assert_eq!(prefilter("Xin chào bạn", today()).verdict, Verdict::LikelyNotTask);
        let r = prefilter("bạn là ai vậy?", today());
        assert_eq!(r.verdict, Verdict::LikelyNotTask);
        assert_eq!(r.confidence, 0.8);
    }

    #[test]
    fn test_greeting_with_task_is_task() {
        let r = prefilter("chào bạn, nhắc tôi họp lúc 9h", today());
        assert_eq!(r.verdict, Verdict::LikelyTask);
        assert_eq!(r.confidence, 0.8);
    }

    #[test]
    fn test_indicator_counts() {
        let r = prefilter("Họp với khách hàng lúc 15:00 ngày mai", today());
        assert_eq!(r.verdict, Verdict::LikelyTask);
        assert!(r.indicators >= 2);

        let r = prefilter("mua sữa", today());
        assert_eq!(r.verdict, Verdict::LikelyTask);
        assert_eq!(r.confidence, 0.6);

        assert_eq!(prefilter("trời đẹp quá", today()).verdict, Verdict::Uncertain);
    }

    #[test]
    fn test_command_marker() {
        assert!(is_command("  /list"));
        assert!(!is_command("list"));
    }
}
