//! Progressive degradation when the remote NLU is unavailable

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::patterns::base_fields;
use super::vocab::{self, TASK_INDICATORS};
use crate::domain::{ExtractedFields, Intent, ParseResult, ParseSource};

const SIMPLIFIED_CONFIDENCE: f64 = 0.5;
const ASK_USER_CONFIDENCE: f64 = 0.3;

/// How far down the fallback chain a classification went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    /// Loose re-scan for indicators and temporal phrases
    SimplifiedPatterns,
    /// Nothing usable; ask the user what they meant
    AskUser,
}

/// Run the chain and report where it stopped
pub fn run(message: &str, today: NaiveDate) -> (ParseResult, FallbackLevel) {
    debug!(%message, "fallback::run: called");
    if let Some(result) = simplified_scan(message, today) {
        return (result, FallbackLevel::SimplifiedPatterns);
    }
    let result = ParseResult::new(
        Intent::Unclear,
        ExtractedFields::default(),
        ASK_USER_CONFIDENCE,
        ParseSource::Fallback,
        "no local signal and remote NLU unavailable",
    );
    (result, FallbackLevel::AskUser)
}

fn simplified_scan(message: &str, today: NaiveDate) -> Option<ParseResult> {
    let folded = vocab::fold(message);
    let indicators = vocab::count_terms(&folded, TASK_INDICATORS);
    let (fields, found) = base_fields(message, today);
    if indicators == 0 && found.is_empty() {
        return None;
    }
    fields.title.as_ref()?;
    Some(ParseResult::new(
        Intent::CreateTask,
        fields,
        SIMPLIFIED_CONFIDENCE,
        ParseSource::Fallback,
        format!("simplified scan: {} indicator(s), temporal={}", indicators, !found.is_empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_simplified_scan_finds_task() {
        let (result, level) = run("mua quà sinh nhật thứ 7", today());
        assert_eq!(level, FallbackLevel::SimplifiedPatterns);
        assert_eq!(result.intent, Intent::CreateTask);
        assert_eq!(result.confidence(), 0.5);
        assert_eq!(result.fields.title.as_deref(), Some("Mua quà sinh nhật"));
    }

    #[test]
    fn test_ask_user_when_nothing_found() {
        let (result, level) = run("hmm để xem nào", today());
        assert_eq!(level, FallbackLevel::AskUser);
        assert_eq!(result.intent, Intent::Unclear);
        assert_eq!(result.source, ParseSource::Fallback);
    }
}
