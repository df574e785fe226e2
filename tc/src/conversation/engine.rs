//! Slot-filling state machine
//!
//! A session starts with whatever the classifier extracted and asks for the
//! required fields that are still missing, one at a time. Each reply is read
//! in field mode; the set of missing fields is recomputed after every merge.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info};

use super::state::{ConversationStage, ConversationState};
use super::store::{Expiring, SessionStore};
use crate::clock::Clock;
use crate::domain::{ExtractedFields, Intent, TaskField, TaskInfo};
use crate::intent::{IntentClassifier, vocab};

/// What the engine wants the caller to do after a turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "turn", rename_all = "snake_case")]
pub enum Turn {
    /// Ask the user something; `field` is None for the confirmation question
    Prompt { field: Option<TaskField>, message: String },
    /// All required fields are settled
    Complete { info: TaskInfo, message: String },
    Cancelled { message: String },
    TimedOut { message: String },
}

impl Turn {
    /// Text to show the user, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Prompt { message, .. } | Self::Cancelled { message } | Self::TimedOut { message } => Some(message),
            Self::Complete { .. } => None,
        }
    }
}

pub const CANCELLED_MESSAGE: &str = "Đã hủy tạo công việc.";

pub fn field_prompt(field: TaskField) -> &'static str {
    match field {
        TaskField::Title => "Bạn muốn đặt tiêu đề công việc là gì?",
        TaskField::Date => "Việc này vào ngày nào? (trả lời \"không cần\" nếu không có hạn)",
        TaskField::Time => "Mấy giờ bắt đầu?",
        TaskField::EndTime => "Mấy giờ kết thúc?",
        TaskField::Attendees => "Ai sẽ tham dự?",
        TaskField::Location => "Diễn ra ở đâu?",
        TaskField::Description => "Bạn muốn thêm mô tả gì?",
    }
}

pub struct ConversationEngine {
    classifier: Arc<IntentClassifier>,
    sessions: Arc<dyn SessionStore<ConversationState>>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl ConversationEngine {
    pub fn new(
        classifier: Arc<IntentClassifier>,
        sessions: Arc<dyn SessionStore<ConversationState>>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            sessions,
            clock,
            timeout,
        }
    }

    pub fn state(&self, user_id: &str) -> Option<ConversationState> {
        self.sessions.get(user_id)
    }

    pub fn is_active(&self, user_id: &str) -> bool {
        self.sessions.get(user_id).is_some_and(|s| !s.stage.is_terminal())
    }

    /// Open a session for a freshly classified task
    ///
    /// With nothing missing and no confirmation wanted the task completes
    /// immediately and no session is stored.
    pub fn start(&self, user_id: &str, info: TaskInfo, message: &str, confirm: bool) -> Turn {
        debug!(%user_id, task_type = %info.task_type, confirm, "ConversationEngine::start: called");
        let mut state = ConversationState::new(user_id, info, message, self.clock.now());
        let turn = self.advance(&mut state, confirm);
        self.persist(state);
        turn
    }

    /// Drop the session if it idled past the timeout
    pub fn check_expiry(&self, user_id: &str) -> Option<Turn> {
        let state = self.sessions.get(user_id)?;
        if !state.is_expired(self.clock.now(), self.timeout) {
            return None;
        }
        info!(%user_id, "ConversationEngine: session expired");
        self.sessions.delete(user_id);
        Some(Turn::TimedOut {
            message: timeout_message(self.timeout),
        })
    }

    /// Handle a reply for an active session; None when there is none
    pub async fn handle_reply(&self, user_id: &str, reply: &str) -> Option<Turn> {
        debug!(%user_id, %reply, "ConversationEngine::handle_reply: called");
        if let Some(expired) = self.check_expiry(user_id) {
            return Some(expired);
        }
        let mut state = self.sessions.get(user_id)?;

        if vocab::is_cancel(reply) {
            self.cancel(user_id);
            return Some(Turn::Cancelled {
                message: CANCELLED_MESSAGE.to_string(),
            });
        }
        state.touch(self.clock.now());

        let turn = match state.stage.clone() {
            ConversationStage::AwaitingField(field) => self.fill_field(&mut state, field, reply).await,
            ConversationStage::AwaitingConfirmation => self.confirm(&mut state, reply).await,
            ConversationStage::Complete | ConversationStage::Cancelled => {
                self.sessions.delete(user_id);
                return None;
            }
        };
        self.persist(state);
        Some(turn)
    }

    async fn fill_field(&self, state: &mut ConversationState, field: TaskField, reply: &str) -> Turn {
        let parsed = self.classifier.classify_field(reply, field, &state.info).await;
        debug!(%field, intent = ?parsed.intent, "fill_field: classified");
        match parsed.intent {
            Intent::Skip if field == TaskField::Title => reprompt(field, "Tiêu đề là bắt buộc."),
            Intent::Skip => {
                state.skipped.insert(field);
                self.advance(state, false)
            }
            Intent::Provide => {
                state.info.apply(&parsed.fields, false);
                if !state.info.has(field) {
                    return reprompt(field, "Mình chưa đọc được thông tin này.");
                }
                self.advance(state, false)
            }
            _ => reprompt(field, "Mình chưa hiểu ý bạn."),
        }
    }

    async fn confirm(&self, state: &mut ConversationState, reply: &str) -> Turn {
        if vocab::is_yes(reply) {
            return self.advance(state, false);
        }
        if vocab::is_no(reply) {
            state.stage = ConversationStage::Cancelled;
            return Turn::Cancelled {
                message: CANCELLED_MESSAGE.to_string(),
            };
        }
        // Anything else is treated as a correction to the draft
        let parsed = self.classifier.classify(reply, &state.user_id, &[]).await;
        if parsed.result.intent == Intent::CreateTask && !parsed.result.fields.is_empty() {
            let mut fields = parsed.result.fields;
            // A correction should not rename the task unless it is all it says
            if fields.date.is_some() || fields.start_time.is_some() || !fields.attendees.is_empty() {
                fields.title = None;
            }
            state.info.apply(&fields, true);
        }
        self.advance(state, true)
    }

    /// Overwrite fields of an active session, as an explicit edit
    pub fn edit(&self, user_id: &str, fields: &ExtractedFields) -> Option<Turn> {
        if let Some(expired) = self.check_expiry(user_id) {
            return Some(expired);
        }
        let mut state = self.sessions.get(user_id)?;
        state.touch(self.clock.now());
        let changed = state.info.apply(fields, true);
        for field in &changed {
            state.skipped.remove(field);
        }
        let awaiting_confirmation = state.stage == ConversationStage::AwaitingConfirmation;
        let turn = self.advance(&mut state, awaiting_confirmation);
        self.persist(state);
        Some(turn)
    }

    /// Cancel the user's session; returns whether one existed
    pub fn cancel(&self, user_id: &str) -> bool {
        let existed = self.sessions.delete(user_id).is_some();
        if existed {
            info!(%user_id, "ConversationEngine: session cancelled");
        }
        existed
    }

    /// Remove every idle session, returning the affected users
    pub fn sweep_expired(&self) -> Vec<String> {
        self.sessions.sweep_expired(self.clock.now(), self.timeout)
    }

    /// Move to the next stage given the current fields
    fn advance(&self, state: &mut ConversationState, confirm: bool) -> Turn {
        if let Some(field) = state.missing_fields().first().copied() {
            state.stage = ConversationStage::AwaitingField(field);
            return Turn::Prompt {
                field: Some(field),
                message: field_prompt(field).to_string(),
            };
        }
        if confirm {
            state.stage = ConversationStage::AwaitingConfirmation;
            return Turn::Prompt {
                field: None,
                message: format!("Tạo {}? (có/không)", state.info.summary()),
            };
        }
        info!(user_id = %state.user_id, "ConversationEngine: session complete");
        state.stage = ConversationStage::Complete;
        Turn::Complete {
            info: state.info.clone(),
            message: state.message.clone(),
        }
    }

    /// Keep open sessions, drop finished ones
    fn persist(&self, state: ConversationState) {
        if state.stage.is_terminal() {
            self.sessions.delete(&state.user_id);
        } else {
            let user_id = state.user_id.clone();
            self.sessions.set(&user_id, state);
        }
    }
}

fn reprompt(field: TaskField, reason: &str) -> Turn {
    Turn::Prompt {
        field: Some(field),
        message: format!("{} {}", reason, field_prompt(field)),
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!(
        "Phiên tạo công việc đã hết hạn sau {} phút không hoạt động. Bạn hãy gửi lại yêu cầu nhé.",
        timeout.num_minutes().max(1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::ClassifierConfig;
    use crate::conversation::MemorySessionStore;
    use crate::domain::TaskType;
    use crate::nlu::OfflineNlu;
    use chrono::{NaiveDate, NaiveTime};

    fn setup() -> (ConversationEngine, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::at(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 9, 0));
        let classifier = Arc::new(IntentClassifier::new(
            ClassifierConfig::default(),
            Arc::new(OfflineNlu),
            clock.clone(),
        ));
        let engine = ConversationEngine::new(
            classifier,
            Arc::new(MemorySessionStore::new()),
            clock.clone(),
            Duration::minutes(5),
        );
        (engine, clock)
    }

    fn titled(title: &str, task_type: TaskType) -> TaskInfo {
        TaskInfo {
            title: title.to_string(),
            task_type,
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_info_completes_immediately() {
        let (engine, _) = setup();
        let mut info = titled("Nộp báo cáo", TaskType::Task);
        info.due_date = NaiveDate::from_ymd_opt(2026, 10, 23);

        let turn = engine.start("u1", info.clone(), "nộp báo cáo thứ 6", false);

        assert!(matches!(turn, Turn::Complete { info: done, .. } if done == info));
        assert!(!engine.is_active("u1"));
    }

    #[tokio::test]
    async fn test_skip_date_completes() {
        let (engine, _) = setup();
        let turn = engine.start("u1", titled("Mua sữa", TaskType::Task), "mua sữa", false);
        assert_eq!(
            turn,
            Turn::Prompt {
                field: Some(TaskField::Date),
                message: field_prompt(TaskField::Date).to_string()
            }
        );

        let turn = engine.handle_reply("u1", "không cần deadline").await.unwrap();

        match turn {
            Turn::Complete { info, .. } => assert!(info.due_date.is_none()),
            other => panic!("expected completion, got {:?}", other),
        }
        assert!(!engine.is_active("u1"));
    }

    #[tokio::test]
    async fn test_meeting_asks_each_missing_field() {
        let (engine, _) = setup();
        engine.start("u1", titled("Họp dự án", TaskType::Meeting), "họp dự án", false);

        let turn = engine.handle_reply("u1", "ngày mai").await.unwrap();
        assert!(matches!(turn, Turn::Prompt { field: Some(TaskField::Time), .. }));

        let turn = engine.handle_reply("u1", "10h").await.unwrap();
        assert!(matches!(turn, Turn::Prompt { field: Some(TaskField::Attendees), .. }));

        let turn = engine.handle_reply("u1", "An, Bình").await.unwrap();
        let Turn::Complete { info, .. } = turn else {
            panic!("expected completion");
        };
        assert_eq!(info.due_date, NaiveDate::from_ymd_opt(2026, 10, 20));
        assert_eq!(info.start_time, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(info.attendees, vec!["An".to_string(), "Bình".to_string()]);
    }

    #[tokio::test]
    async fn test_reply_with_two_fields_advances_past_both() {
        let (engine, _) = setup();
        engine.start("u1", titled("Họp dự án", TaskType::Meeting), "họp dự án", false);

        let turn = engine.handle_reply("u1", "ngày mai lúc 10h").await.unwrap();

        assert!(matches!(turn, Turn::Prompt { field: Some(TaskField::Attendees), .. }));
        let state = engine.state("u1").unwrap();
        assert_eq!(state.info.due_date, NaiveDate::from_ymd_opt(2026, 10, 20));
        assert_eq!(state.info.start_time, NaiveTime::from_hms_opt(10, 0, 0));
    }

    #[tokio::test]
    async fn test_date_reply_with_skip_words_keeps_date() {
        let (engine, _) = setup();
        engine.start("u1", titled("Nộp báo cáo", TaskType::Task), "nộp báo cáo", false);

        let turn = engine.handle_reply("u1", "thứ 6, không cần gấp").await.unwrap();

        match turn {
            Turn::Complete { info, .. } => assert_eq!(info.due_date, NaiveDate::from_ymd_opt(2026, 10, 23)),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unclear_reply_reprompts_same_field() {
        let (engine, _) = setup();
        engine.start("u1", titled("Mua sữa", TaskType::Task), "mua sữa", false);

        let turn = engine.handle_reply("u1", "hmm").await.unwrap();

        assert!(matches!(turn, Turn::Prompt { field: Some(TaskField::Date), .. }));
        assert!(engine.is_active("u1"));
    }

    #[tokio::test]
    async fn test_cancel_vocabulary_cancels() {
        let (engine, _) = setup();
        engine.start("u1", titled("Mua sữa", TaskType::Task), "mua sữa", false);

        let turn = engine.handle_reply("u1", "Hủy").await.unwrap();

        assert!(matches!(turn, Turn::Cancelled { .. }));
        assert!(engine.state("u1").is_none());
    }

    #[tokio::test]
    async fn test_idle_session_times_out_on_next_reply() {
        let (engine, clock) = setup();
        engine.start("u1", titled("Mua sữa", TaskType::Task), "mua sữa", false);

        clock.advance(Duration::minutes(5) + Duration::seconds(1));
        let turn = engine.handle_reply("u1", "ngày mai").await.unwrap();

        assert!(matches!(turn, Turn::TimedOut { .. }));
        assert!(engine.state("u1").is_none());
    }

    #[tokio::test]
    async fn test_session_at_exact_timeout_survives() {
        let (engine, clock) = setup();
        engine.start("u1", titled("Mua sữa", TaskType::Task), "mua sữa", false);

        clock.advance(Duration::minutes(5));
        let turn = engine.handle_reply("u1", "ngày mai").await.unwrap();

        assert!(matches!(turn, Turn::Complete { .. }));
    }

    #[tokio::test]
    async fn test_confirmation_flow() {
        let (engine, _) = setup();
        let mut info = titled("Gọi mẹ", TaskType::Task);
        info.due_date = NaiveDate::from_ymd_opt(2026, 10, 19);

        let turn = engine.start("u1", info, "gọi mẹ", true);
        assert!(matches!(turn, Turn::Prompt { field: None, .. }));

        let turn = engine.handle_reply("u1", "ok").await.unwrap();
        assert!(matches!(turn, Turn::Complete { .. }));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (engine, _) = setup();
        engine.start("a", titled("Việc A", TaskType::Task), "việc a", false);
        engine.start("b", titled("Việc B", TaskType::Task), "việc b", false);

        engine.handle_reply("a", "hủy").await;

        assert!(!engine.is_active("a"));
        assert!(engine.is_active("b"));
    }

    #[test]
    fn test_edit_overwrites_and_clears_skip() {
        let (engine, _) = setup();
        engine.start("u1", titled("Mua sữa", TaskType::Task), "mua sữa", false);

        let turn = engine
            .edit(
                "u1",
                &ExtractedFields {
                    title: Some("Mua sữa tươi".to_string()),
                    date: NaiveDate::from_ymd_opt(2026, 10, 21),
                    ..Default::default()
                },
            )
            .unwrap();

        let Turn::Complete { info, .. } = turn else {
            panic!("expected completion");
        };
        assert_eq!(info.title, "Mua sữa tươi");
    }
}
