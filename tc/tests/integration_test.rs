//! Integration tests for TaskChat
//!
//! End-to-end message handling through the assistant with an in-memory
//! store, offline calendar service and a scripted remote NLU.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use taskchat::assistant::{Assistant, Collaborators};
use taskchat::clock::FixedClock;
use taskchat::config::{ClassifierConfig, Config};
use taskchat::conflict::{BusyInterval, ConflictDetector, ConflictKind};
use taskchat::domain::{ExtractedFields, Intent, ParseResult, ParseSource, TaskField, TaskInfo};
use taskchat::intent::FallbackLevel;
use taskchat::nlu::{NluError, RemoteNlu};
use taskchat::reference::{BatchOp, batch_apply, parse_batch_references};
use taskchat::services::{ChatTransport, LoggingReminderScheduler, OfflineCalendarService, ServiceError};
use taskstore::{MemoryStore, SqliteStore, Task, TaskFilter, TaskOrder, TaskStore, TaskType};
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

/// Remote NLU that answers every message with the same extraction
struct ScriptedNlu {
    title: &'static str,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedNlu {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(title: &'static str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(title)
        }
    }
}

#[async_trait]
impl RemoteNlu for ScriptedNlu {
    async fn extract_task(&self, _text: &str, _history: &[String], _today: NaiveDate) -> Result<ParseResult, NluError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(ParseResult::new(
            Intent::CreateTask,
            ExtractedFields {
                title: Some(self.title.to_string()),
                task_type: Some(TaskType::Task),
                ..Default::default()
            },
            0.9,
            ParseSource::Remote,
            "scripted",
        ))
    }

    async fn parse_field(
        &self,
        _text: &str,
        _field: TaskField,
        _context: &TaskInfo,
        _today: NaiveDate,
    ) -> Result<ParseResult, NluError> {
        Err(NluError::Unavailable)
    }
}

/// Transport that keeps every delivered message
#[derive(Default)]
struct RecordingTransport {
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, user_id: &str, text: &str) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

struct Harness {
    assistant: Assistant,
    store: Arc<dyn TaskStore>,
    clock: Arc<FixedClock>,
    transport: Arc<RecordingTransport>,
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date")
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

fn harness_with(config: Config, nlu: Arc<dyn RemoteNlu>, store: Arc<dyn TaskStore>) -> Harness {
    let clock = Arc::new(FixedClock::at(monday(), 9, 0));
    let transport = Arc::new(RecordingTransport::default());
    let deps = Collaborators {
        nlu,
        store: store.clone(),
        calendar: Arc::new(OfflineCalendarService::from_config(&config.services)),
        reminders: Arc::new(LoggingReminderScheduler::new()),
        transport: transport.clone(),
        clock: clock.clone(),
    };
    Harness {
        assistant: Assistant::new(&config, deps),
        store,
        clock,
        transport,
    }
}

fn harness(nlu: Arc<dyn RemoteNlu>) -> Harness {
    harness_with(Config::default(), nlu, Arc::new(MemoryStore::new()))
}

fn tasks(store: &dyn TaskStore, user: &str) -> Vec<Task> {
    store
        .query_tasks(&TaskFilter::for_user(user), TaskOrder::Created)
        .expect("query tasks")
}

// =============================================================================
// Scenario tests
// =============================================================================

#[tokio::test]
async fn test_meeting_message_becomes_calendar_entry() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));

    let replies = h.assistant.handle("u1", "Họp với khách hàng lúc 15:00 ngày mai").await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("✅"), "{:?}", replies);
    let stored = tasks(h.store.as_ref(), "u1");
    assert_eq!(stored.len(), 1);
    let meeting = &stored[0];
    assert_eq!(meeting.task_type, TaskType::Meeting);
    assert_eq!(meeting.due_date, NaiveDate::from_ymd_opt(2026, 10, 20));
    assert_eq!(meeting.start_time, Some(t(15, 0)));
    assert!(meeting.title.contains("Họp với khách hàng"));
    assert_eq!(meeting.attendees, vec!["khách hàng".to_string()]);
}

#[test]
fn test_overlap_suggestions_keep_clear_of_busy_block() {
    let detector = ConflictDetector::new(Config::default().conflict);
    let busy = [BusyInterval {
        task_id: 1,
        title: "Họp nhóm".to_string(),
        start: t(9, 0),
        end: Some(t(10, 0)),
    }];

    let result = detector.detect(monday(), t(9, 30), None, &busy);

    assert!(result.has_conflict);
    assert_eq!(result.conflicts[0].kind, ConflictKind::Overlap);
    assert!(!result.suggested_times.is_empty());
    for time in &result.suggested_times {
        assert!(*time >= t(8, 0) && *time < t(18, 0));
        // Neither overlapping nor within an hour of 09:00-10:00
        assert!(*time >= t(11, 0) || *time <= t(7, 0), "{}", time);
    }
}

#[tokio::test]
async fn test_batch_delete_three_of_three() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));
    for title in ["Mua sữa", "Gọi điện cho mẹ", "Nộp báo cáo"] {
        h.store
            .insert_task(&Task::new("u1", title, TaskType::Task))
            .expect("insert");
    }
    let snapshot = h
        .store
        .query_tasks(&TaskFilter::open_for_user("u1"), TaskOrder::Due)
        .expect("query");

    let refs = parse_batch_references("1,2,3");
    let result = batch_apply(&refs, BatchOp::Delete, &snapshot, h.store.as_ref());

    assert_eq!(result.success_count, 3);
    assert_eq!(result.failed_count, 0);
    assert!(tasks(h.store.as_ref(), "u1").is_empty());
    assert_eq!(h.store.deleted_records("u1").expect("records").len(), 3);
}

#[tokio::test]
async fn test_skip_deadline_completes_task() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));

    let replies = h.assistant.handle("u1", "Nhắc tôi mua sữa").await;
    assert!(replies[0].contains("ngày nào"), "{:?}", replies);
    assert!(tasks(h.store.as_ref(), "u1").is_empty());

    let replies = h.assistant.handle("u1", "không cần deadline").await;
    assert!(replies[0].starts_with("✅"), "{:?}", replies);
    let stored = tasks(h.store.as_ref(), "u1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].due_date, None);
    assert_eq!(stored[0].task_list_id.as_deref(), Some("todo"));
}

// =============================================================================
// Remote NLU
// =============================================================================

#[tokio::test]
async fn test_remote_extraction_then_target_question() {
    let nlu = Arc::new(ScriptedNlu::new("Dọn kho"));
    let h = harness(nlu.clone());

    let replies = h.assistant.handle("u1", "dọn kho đi").await;
    assert_eq!(nlu.calls.load(Ordering::SeqCst), 1);
    assert!(replies[0].contains("ngày nào"), "{:?}", replies);

    // No rule or history points anywhere, so the user is asked
    let replies = h.assistant.handle("u1", "không cần").await;
    assert!(replies[0].contains("Bạn muốn lưu vào"), "{:?}", replies);

    let replies = h.assistant.handle("u1", "2").await;
    assert!(replies[0].starts_with("✅"), "{:?}", replies);
    let stored = tasks(h.store.as_ref(), "u1");
    assert_eq!(stored[0].title, "Dọn kho");
    assert_eq!(stored[0].task_list_id.as_deref(), Some("personal"));

    let pref = h.assistant.selector().preference("u1").expect("learned");
    assert_eq!(pref.total_selections, 1);
}

#[tokio::test]
async fn test_remote_timeout_uses_local_fallback() {
    let config = Config {
        classifier: ClassifierConfig {
            remote_timeout_ms: 50,
            ..Default::default()
        },
        ..Default::default()
    };
    let nlu = Arc::new(ScriptedNlu::slow("never used", Duration::from_secs(5)));
    let h = harness_with(config, nlu, Arc::new(MemoryStore::new()));

    let outcome = h.assistant.classifier().classify("mua quà ở Vincom", "u1", &[]).await;

    assert!(outcome.success);
    assert_eq!(outcome.result.intent, Intent::CreateTask);
    assert_eq!(outcome.result.source, ParseSource::Fallback);
    assert_eq!(outcome.diagnostics.fallback_level, Some(FallbackLevel::SimplifiedPatterns));
    assert!(outcome.diagnostics.elapsed_ms < 5000);
    assert!(
        outcome
            .diagnostics
            .remote_error
            .as_deref()
            .is_some_and(|e| e.contains("timed out"))
    );
}

// =============================================================================
// Commands, expiry and delivery
// =============================================================================

#[tokio::test]
async fn test_natural_delete_against_listed_tasks() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));
    for title in ["Việc một", "Việc hai", "Việc ba", "Việc bốn", "Việc năm"] {
        h.store
            .insert_task(&Task::new("u1", title, TaskType::Task))
            .expect("insert");
    }

    let listing = h.assistant.handle("u1", "/list").await;
    assert!(listing[0].contains("5. "), "{:?}", listing);

    let replies = h.assistant.handle("u1", "xóa 1,2,3").await;
    assert!(replies[0].contains("3 công việc"), "{:?}", replies);

    let left: Vec<String> = tasks(h.store.as_ref(), "u1").into_iter().map(|t| t.title).collect();
    assert_eq!(left.len(), 2);
}

#[tokio::test]
async fn test_unknown_reference_reports_failure() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));
    h.store
        .insert_task(&Task::new("u1", "Mua sữa", TaskType::Task))
        .expect("insert");

    let replies = h.assistant.handle("u1", "/done 7").await;

    assert!(replies[0].contains("✗"), "{:?}", replies);
    assert!(!tasks(h.store.as_ref(), "u1")[0].completed);
}

#[tokio::test]
async fn test_users_do_not_share_sessions() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));
    h.assistant.handle("u1", "Nhắc tôi mua sữa").await;

    let replies = h.assistant.handle("u2", "không cần").await;

    // u2 has no session, so the reply is classified afresh rather than skipping
    assert!(!replies[0].starts_with("✅"), "{:?}", replies);
    assert!(tasks(h.store.as_ref(), "u1").is_empty());
    assert!(tasks(h.store.as_ref(), "u2").is_empty());
}

#[tokio::test]
async fn test_sweep_drops_idle_sessions() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));
    h.assistant.handle("u1", "Nhắc tôi mua sữa").await;

    assert!(h.assistant.sweep_expired().is_empty());
    h.clock.advance(chrono::Duration::seconds(301));
    assert_eq!(h.assistant.sweep_expired(), vec!["u1".to_string()]);
    assert!(!h.assistant.cancel_all("u1"));
}

#[tokio::test]
async fn test_replies_delivered_through_transport() {
    let h = harness(Arc::new(ScriptedNlu::new("unused")));

    let replies = h.assistant.handle_and_send("u9", "/help").await;

    let sent = h.transport.sent.lock().unwrap_or_else(|p| p.into_inner()).clone();
    assert_eq!(sent.len(), replies.len());
    assert_eq!(sent[0].0, "u9");
    assert!(sent[0].1.contains("/list"));
}

#[tokio::test]
async fn test_sqlite_backed_assistant_persists() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = temp_dir.path().join("tasks.db");
    let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::open(&db).expect("open sqlite"));
    let h = harness_with(Config::default(), Arc::new(ScriptedNlu::new("unused")), store);

    h.assistant.handle("u1", "Nộp báo cáo trước thứ 6").await;
    drop(h);

    let reopened = SqliteStore::open(&db).expect("reopen sqlite");
    let stored = tasks(&reopened, "u1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].due_date, NaiveDate::from_ymd_opt(2026, 10, 23));
    assert!(stored[0].external_id.is_some());
}
