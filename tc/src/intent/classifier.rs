//! Multi-stage intent classifier
//!
//! Stages run cheapest first and stop at the first one that clears its bar:
//! pre-filter, local patterns, result cache, remote NLU (under a hard
//! timeout), then the local fallback chain. Classification never fails; the
//! worst case is an `Unclear` result that asks the user to rephrase.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::NaiveTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::ClassifierCache;
use super::fallback::{self, FallbackLevel};
use super::patterns::{self, PatternLibrary};
use super::prefilter::{self, PrefilterResult, Verdict};
use super::temporal;
use super::vocab;
use crate::clock::Clock;
use crate::config::ClassifierConfig;
use crate::domain::{ExtractedFields, Intent, ParseResult, ParseSource, TaskField, TaskInfo};
use crate::nlu::{NluError, RemoteNlu};

const FIELD_SKIP_CONFIDENCE: f64 = 0.95;
const FIELD_LOCAL_CONFIDENCE: f64 = 0.8;
const FIELD_UNCLEAR_CONFIDENCE: f64 = 0.3;

/// Pipeline stage, recorded in diagnostics in the order visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prefilter,
    Pattern,
    Cache,
    Remote,
    Fallback,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub stages: Vec<Stage>,
    pub prefilter: Option<PrefilterResult>,
    pub matched_rules: Vec<&'static str>,
    pub cache_hit: bool,
    pub remote_calls: u32,
    pub remote_error: Option<String>,
    pub fallback_level: Option<FallbackLevel>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcome {
    /// False only when the fallback chain had nothing to offer
    pub success: bool,
    pub result: ParseResult,
    pub diagnostics: Diagnostics,
    /// Reply for messages that are not tasks
    pub canned_reply: Option<String>,
}

pub struct IntentClassifier {
    config: ClassifierConfig,
    patterns: PatternLibrary,
    cache: Mutex<ClassifierCache>,
    nlu: Arc<dyn RemoteNlu>,
    clock: Arc<dyn Clock>,
}

impl IntentClassifier {
    pub fn new(config: ClassifierConfig, nlu: Arc<dyn RemoteNlu>, clock: Arc<dyn Clock>) -> Self {
        let cache = Mutex::new(ClassifierCache::new(&config.cache));
        Self {
            config,
            patterns: PatternLibrary::new(),
            cache,
            nlu,
            clock,
        }
    }

    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ClassifierCache> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Classify a free-form message
    pub async fn classify(&self, message: &str, user_id: &str, history: &[String]) -> ClassifyOutcome {
        debug!(%user_id, %message, history = history.len(), "classify: called");
        let started = Instant::now();
        let today = self.clock.today();
        let mut diag = Diagnostics::default();

        if !prefilter::is_command(message) {
            diag.stages.push(Stage::Prefilter);
            let screened = prefilter::prefilter(message, today);
            let short_circuit =
                screened.verdict == Verdict::LikelyNotTask && screened.confidence >= self.config.prefilter_short_circuit;
            let reason = screened.reason;
            diag.prefilter = Some(screened.clone());
            if short_circuit {
                debug!(reason, "classify: pre-filter short circuit");
                let result = ParseResult::new(
                    Intent::NotTask,
                    ExtractedFields::default(),
                    screened.confidence,
                    ParseSource::Pattern,
                    format!("pre-filter: {}", reason),
                );
                return self.finish(result, diag, started, Some(canned_reply(reason)));
            }
        }

        diag.stages.push(Stage::Pattern);
        let local = self.patterns.evaluate(message, today);
        if let Some(m) = &local {
            diag.matched_rules = m.rules.clone();
            if m.confidence >= self.config.confidence_threshold {
                let result = ParseResult::new(
                    m.intent.clone(),
                    m.fields.clone(),
                    m.confidence,
                    ParseSource::Pattern,
                    format!("rules: {}", m.rules.join(", ")),
                );
                return self.finish(result, diag, started, None);
            }
        }

        diag.stages.push(Stage::Cache);
        let now = self.clock.now();
        if let Some(hit) = self.lock_cache().get(user_id, message, now) {
            diag.cache_hit = true;
            return self.finish(hit, diag, started, None);
        }

        diag.stages.push(Stage::Remote);
        diag.remote_calls += 1;
        let timeout = self.config.remote_timeout();
        let remote = match tokio::time::timeout(timeout, self.nlu.extract_task(message, history, today)).await {
            Ok(result) => result,
            Err(_) => Err(NluError::Timeout(timeout)),
        };
        match remote {
            Ok(result) => {
                info!(intent = ?result.intent, confidence = result.confidence(), "classify: remote result");
                self.lock_cache().insert(user_id, message, result.clone(), now);
                self.finish(result, diag, started, None)
            }
            Err(e) => {
                warn!(error = %e, "classify: remote NLU failed, falling back");
                diag.remote_error = Some(e.to_string());
                diag.stages.push(Stage::Fallback);
                let (mut result, mut level) = fallback::run(message, today);
                if let Some(m) = local
                    && m.confidence > result.confidence()
                {
                    result = ParseResult::new(
                        m.intent,
                        m.fields,
                        m.confidence,
                        ParseSource::Fallback,
                        format!("low-confidence rules: {}", m.rules.join(", ")),
                    );
                    level = FallbackLevel::SimplifiedPatterns;
                }
                diag.fallback_level = Some(level);
                self.finish(result, diag, started, None)
            }
        }
    }

    fn finish(
        &self,
        result: ParseResult,
        mut diag: Diagnostics,
        started: Instant,
        canned: Option<String>,
    ) -> ClassifyOutcome {
        diag.elapsed_ms = started.elapsed().as_millis() as u64;
        let canned_reply = match (&result.intent, canned) {
            (_, Some(reply)) => Some(reply),
            (Intent::NotTask, None) => Some(canned_reply("not a task")),
            _ => None,
        };
        debug!(intent = ?result.intent, source = %result.source, confidence = result.confidence(), "classify: done");
        ClassifyOutcome {
            success: result.intent != Intent::Unclear,
            result,
            diagnostics: diag,
            canned_reply,
        }
    }

    /// Interpret a reply to "what is the <field>?"
    pub async fn classify_field(&self, reply: &str, field: TaskField, context: &TaskInfo) -> ParseResult {
        debug!(%reply, %field, "classify_field: called");
        let today = self.clock.today();
        let local = extract_field_locally(reply, field, today);

        // A stated value wins over skip words elsewhere in the reply
        if !states_value(reply, field, &local) && vocab::is_skip(reply) {
            return ParseResult::new(
                Intent::Skip,
                ExtractedFields::default(),
                FIELD_SKIP_CONFIDENCE,
                ParseSource::Pattern,
                "skip vocabulary",
            );
        }

        if !local.is_empty() {
            return ParseResult::new(
                Intent::Provide,
                local,
                FIELD_LOCAL_CONFIDENCE,
                ParseSource::Pattern,
                format!("local extraction for {}", field),
            );
        }

        let timeout = self.config.remote_timeout();
        match tokio::time::timeout(timeout, self.nlu.parse_field(reply, field, context, today)).await {
            Ok(Ok(result)) if matches!(result.intent, Intent::Provide | Intent::Skip) => result,
            Ok(Ok(result)) => {
                debug!(intent = ?result.intent, "classify_field: remote could not read the field");
                unclear_field(field)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "classify_field: remote NLU failed");
                unclear_field(field)
            }
            Err(_) => {
                warn!(?timeout, "classify_field: remote NLU timed out");
                unclear_field(field)
            }
        }
    }
}

fn unclear_field(field: TaskField) -> ParseResult {
    ParseResult::new(
        Intent::Unclear,
        ExtractedFields::default(),
        FIELD_UNCLEAR_CONFIDENCE,
        ParseSource::Fallback,
        format!("could not read {}", field),
    )
}

/// Whether the reply names a concrete value for a structured field
///
/// Free-text fields always echo the reply, so they never count here.
fn states_value(reply: &str, field: TaskField, local: &ExtractedFields) -> bool {
    match field {
        TaskField::Date => local.date.is_some(),
        TaskField::Time => local.start_time.is_some(),
        TaskField::EndTime => local.end_time.is_some(),
        TaskField::Attendees => !patterns::extract_attendees(reply).is_empty(),
        TaskField::Title | TaskField::Location | TaskField::Description => false,
    }
}

/// Pull the asked-for field (and any date or time) out of a short reply
fn extract_field_locally(reply: &str, field: TaskField, today: chrono::NaiveDate) -> ExtractedFields {
    let found = temporal::extract(reply, today);
    let mut fields = ExtractedFields {
        date: found.date,
        start_time: found.start,
        end_time: found.end,
        ..Default::default()
    };
    let text = reply.trim();

    match field {
        TaskField::Title => {
            fields.title = patterns::clean_title(reply, &found);
        }
        TaskField::Time | TaskField::EndTime if found.start.is_none() => {
            // A bare hour such as "15" or "9"
            if let Ok(hour) = text.parse::<u32>()
                && let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0)
            {
                if field == TaskField::Time {
                    fields.start_time = Some(time);
                } else {
                    fields.end_time = Some(time);
                }
            }
        }
        TaskField::EndTime => {
            // A lone time answers the end-time question
            if found.end.is_none() {
                fields.end_time = found.start;
                fields.start_time = None;
            }
        }
        TaskField::Attendees => {
            let mut names = patterns::extract_attendees(reply);
            if names.is_empty() {
                let stripped = text
                    .trim_start_matches("với ")
                    .trim_start_matches("with ")
                    .trim_start_matches("cùng ");
                names = patterns::split_names(stripped);
            }
            fields.attendees = names;
        }
        TaskField::Location => {
            fields.location = patterns::extract_location(reply).or_else(|| {
                let stripped = text
                    .trim_start_matches("tại ")
                    .trim_start_matches("ở ")
                    .trim_start_matches("at ")
                    .trim();
                (!stripped.is_empty()).then(|| stripped.to_string())
            });
        }
        TaskField::Description => {
            if !text.is_empty() {
                fields.description = Some(text.to_string());
            }
        }
        TaskField::Date | TaskField::Time => {}
    }
    fields
}

/// Reply for messages screened out as not tasks
pub fn canned_reply(reason: &str) -> String {
    match reason {
        "greeting" => "Xin chào! Mình có thể giúp bạn tạo công việc hoặc lịch hẹn. \
                       Ví dụ: \"Họp với khách hàng lúc 15:00 ngày mai\"."
            .to_string(),
        "question" => "Mình chuyên giúp quản lý công việc và lịch hẹn. Gõ /help để xem hướng dẫn.".to_string(),
        _ => "Mình chưa thấy công việc nào trong tin nhắn này. Bạn muốn tạo công việc hay lịch hẹn?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::{CommandKind, CommandRequest};
    use crate::nlu::OfflineNlu;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use taskstore::TaskType;

    /// Remote NLU returning a fixed result, optionally after a delay
    struct StubNlu {
        result: ParseResult,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubNlu {
        fn new(result: ParseResult) -> Self {
            Self {
                result,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteNlu for StubNlu {
        async fn extract_task(
            &self,
            _text: &str,
            _history: &[String],
            _today: NaiveDate,
        ) -> Result<ParseResult, NluError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.result.clone())
        }

        async fn parse_field(
            &self,
            _text: &str,
            _field: TaskField,
            _context: &TaskInfo,
            _today: NaiveDate,
        ) -> Result<ParseResult, NluError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::at(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 9, 0))
    }

    fn remote_task(confidence: f64) -> ParseResult {
        ParseResult::new(
            Intent::CreateTask,
            ExtractedFields {
                title: Some("Dọn kho".to_string()),
                ..Default::default()
            },
            confidence,
            ParseSource::Remote,
            "stub",
        )
    }

    fn classifier(nlu: Arc<dyn RemoteNlu>) -> IntentClassifier {
        IntentClassifier::new(ClassifierConfig::default(), nlu, clock())
    }

    #[tokio::test]
    async fn test_greeting_short_circuits_without_remote() {
        let nlu = Arc::new(StubNlu::new(remote_task(0.9)));
        let c = classifier(nlu.clone());

        let out = c.classify("xin chào", "u1", &[]).await;

        assert_eq!(out.result.intent, Intent::NotTask);
        assert!(out.canned_reply.is_some());
        assert_eq!(out.diagnostics.remote_calls, 0);
        assert_eq!(nlu.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pattern_match_skips_remote() {
        let nlu = Arc::new(StubNlu::new(remote_task(0.9)));
        let c = classifier(nlu.clone());

        let out = c.classify("Họp với khách hàng lúc 15:00 ngày mai", "u1", &[]).await;

        assert!(out.success);
        assert_eq!(out.result.source, ParseSource::Pattern);
        assert_eq!(out.result.fields.task_type, Some(TaskType::Meeting));
        assert_eq!(out.diagnostics.stages, vec![Stage::Prefilter, Stage::Pattern]);
        assert_eq!(nlu.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_command_bypasses_prefilter() {
        let c = classifier(Arc::new(OfflineNlu));
        let out = c.classify("/ls", "u1", &[]).await;
        assert_eq!(out.diagnostics.stages, vec![Stage::Pattern]);
        assert_eq!(out.result.intent, Intent::Command(CommandRequest::new(CommandKind::List, "")));
    }

    #[tokio::test]
    async fn test_remote_result_cached() {
        let nlu = Arc::new(StubNlu::new(remote_task(0.9)));
        let c = classifier(nlu.clone());

        let first = c.classify("dọn kho đi", "u1", &[]).await;
        assert_eq!(first.result.source, ParseSource::Remote);

        let second = c.classify("Dọn  kho đi", "u1", &[]).await;
        assert_eq!(second.result.source, ParseSource::Cache);
        assert!(second.diagnostics.cache_hit);
        assert_eq!(nlu.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_remote_not_cached() {
        let nlu = Arc::new(StubNlu::new(remote_task(0.65)));
        let c = classifier(nlu.clone());

        c.classify("dọn kho đi", "u1", &[]).await;
        c.classify("dọn kho đi", "u1", &[]).await;

        assert_eq!(nlu.calls.load(Ordering::SeqCst), 2);
        assert_eq!(c.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_remote_timeout_falls_back() {
        let mut stub = StubNlu::new(remote_task(0.9));
        stub.delay = Duration::from_secs(5);
        let config = ClassifierConfig {
            remote_timeout_ms: 50,
            ..Default::default()
        };
        let c = IntentClassifier::new(config, Arc::new(stub), clock());

        let out = c.classify("mua quà ở Vincom", "u1", &[]).await;

        assert_eq!(out.result.source, ParseSource::Fallback);
        assert_eq!(out.diagnostics.fallback_level, Some(FallbackLevel::SimplifiedPatterns));
        assert!(out.diagnostics.remote_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_offline_unclear_asks_user() {
        let c = classifier(Arc::new(OfflineNlu));
        let out = c.classify("hmm để xem nào", "u1", &[]).await;
        assert!(!out.success);
        assert_eq!(out.result.intent, Intent::Unclear);
        assert_eq!(out.diagnostics.fallback_level, Some(FallbackLevel::AskUser));
    }

    #[tokio::test]
    async fn test_field_skip() {
        let c = classifier(Arc::new(OfflineNlu));
        let r = c
            .classify_field("không cần deadline", TaskField::Date, &TaskInfo::default())
            .await;
        assert_eq!(r.intent, Intent::Skip);
    }

    #[tokio::test]
    async fn test_field_value_beats_skip_words() {
        let c = classifier(Arc::new(OfflineNlu));
        let r = c
            .classify_field("thứ 6, không cần gấp", TaskField::Date, &TaskInfo::default())
            .await;
        assert_eq!(r.intent, Intent::Provide);
        assert_eq!(r.fields.date, NaiveDate::from_ymd_opt(2026, 10, 23));

        let r = c.classify_field("bỏ qua", TaskField::Time, &TaskInfo::default()).await;
        assert_eq!(r.intent, Intent::Skip);
    }

    #[tokio::test]
    async fn test_field_local_values() {
        let c = classifier(Arc::new(OfflineNlu));
        let info = TaskInfo::default();

        let r = c.classify_field("thứ 6", TaskField::Date, &info).await;
        assert_eq!(r.intent, Intent::Provide);
        assert_eq!(r.fields.date, NaiveDate::from_ymd_opt(2026, 10, 23));

        let r = c.classify_field("15", TaskField::Time, &info).await;
        assert_eq!(r.fields.start_time, NaiveTime::from_hms_opt(15, 0, 0));

        let r = c.classify_field("An và Bình", TaskField::Attendees, &info).await;
        assert_eq!(r.fields.attendees, vec!["An".to_string(), "Bình".to_string()]);

        let r = c.classify_field("nộp báo cáo quý", TaskField::Title, &info).await;
        assert_eq!(r.fields.title.as_deref(), Some("Nộp báo cáo quý"));
    }

    #[tokio::test]
    async fn test_field_unreadable_is_unclear() {
        let c = classifier(Arc::new(OfflineNlu));
        let r = c.classify_field("hmm", TaskField::Date, &TaskInfo::default()).await;
        assert_eq!(r.intent, Intent::Unclear);
    }
}
