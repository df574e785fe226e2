//! Assistant - the per-message handler
//!
//! Routes each incoming message through expiry checks, pending decisions
//! (target selection, schedule conflicts), the slot-filling conversation and
//! finally the classifier, then runs finished tasks through selection,
//! conflict detection, creation and reminder scheduling.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskstore::{Task, TaskFilter, TaskOrder, TaskStore, TaskUpdate};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::conflict::ConflictDetector;
use crate::conversation::{ConversationEngine, Expiring, MemorySessionStore, SessionStore, Turn, timeout_message};
use crate::domain::{CommandKind, CommandRequest, Intent, ParseSource, PendingTask, TaskField, TaskInfo};
use crate::error::{CoreError, CoreResult};
use crate::intent::{IntentClassifier, prefilter, temporal, vocab};
use crate::nlu::RemoteNlu;
use crate::reference::{BatchOp, batch_apply, parse_batch_references, resolve_strict};
use crate::selector::{PendingSelection, SelectionOption, TargetKind, TargetSelector};
use crate::services::{CalendarService, ChatTransport, ReminderScheduler, reminder_trigger, with_timeout};

pub const HELP_TEXT: &str = "Mình giúp bạn tạo công việc và lịch hẹn từ tin nhắn thường, ví dụ:
  • Họp với khách hàng lúc 15:00 ngày mai
  • Nộp báo cáo trước thứ 6
  • Nhắc tôi gọi mẹ lúc 8h tối
Lệnh:
  /list            danh sách công việc
  /today           việc hôm nay
  /done 1,2 | 2-4  đánh dấu hoàn thành
  /delete 3        xóa công việc
  /edit 2 giờ 16h  sửa một trường
  /cancel          hủy thao tác đang dở";

const UNCLEAR_REPLY: &str = "Mình chưa hiểu ý bạn. Bạn có thể nói rõ hơn, ví dụ: \"Họp nhóm lúc 9h sáng mai\"?";

/// Everything the assistant talks to
pub struct Collaborators {
    pub nlu: Arc<dyn RemoteNlu>,
    pub store: Arc<dyn TaskStore>,
    pub calendar: Arc<dyn CalendarService>,
    pub reminders: Arc<dyn ReminderScheduler>,
    pub transport: Arc<dyn ChatTransport>,
    pub clock: Arc<dyn Clock>,
}

pub struct Assistant {
    classifier: Arc<IntentClassifier>,
    conversation: ConversationEngine,
    selector: TargetSelector,
    detector: ConflictDetector,
    store: Arc<dyn TaskStore>,
    calendar: Arc<dyn CalendarService>,
    reminders: Arc<dyn ReminderScheduler>,
    transport: Arc<dyn ChatTransport>,
    clock: Arc<dyn Clock>,
    pending_tasks: Arc<dyn SessionStore<PendingTask>>,
    pending_selections: Arc<dyn SessionStore<PendingSelection>>,
    session_timeout: chrono::Duration,
    service_timeout: Duration,
    reminder_lead_minutes: i64,
    history_size: usize,
    history: Mutex<HashMap<String, VecDeque<String>>>,
    /// Last task list shown to each user; references resolve against it
    snapshots: Mutex<HashMap<String, Vec<Task>>>,
}

impl Assistant {
    pub fn new(config: &Config, deps: Collaborators) -> Self {
        let classifier = Arc::new(IntentClassifier::new(
            config.classifier.clone(),
            deps.nlu,
            deps.clock.clone(),
        ));
        let session_timeout = config.conversation.session_timeout();
        let conversation = ConversationEngine::new(
            classifier.clone(),
            Arc::new(MemorySessionStore::new()),
            deps.clock.clone(),
            session_timeout,
        );
        Self {
            classifier,
            conversation,
            selector: TargetSelector::new(config.selector.clone(), deps.clock.clone()),
            detector: ConflictDetector::new(config.conflict.clone()),
            store: deps.store,
            calendar: deps.calendar,
            reminders: deps.reminders,
            transport: deps.transport,
            clock: deps.clock,
            pending_tasks: Arc::new(MemorySessionStore::new()),
            pending_selections: Arc::new(MemorySessionStore::new()),
            session_timeout,
            service_timeout: config.services.timeout(),
            reminder_lead_minutes: config.services.reminder_lead_minutes,
            history_size: config.conversation.history_size,
            history: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    /// Handle a message and deliver the replies through the transport
    pub async fn handle_and_send(&self, sender: &str, text: &str) -> Vec<String> {
        let replies = self.handle(sender, text).await;
        for reply in &replies {
            let send = self.transport.send_message(sender, reply);
            if let Err(e) = with_timeout(self.service_timeout, send).await {
                warn!(%sender, error = %e, "handle_and_send: delivery failed");
            }
        }
        replies
    }

    /// Handle one incoming message, returning the replies in order
    pub async fn handle(&self, sender: &str, text: &str) -> Vec<String> {
        debug!(%sender, %text, "Assistant::handle: called");
        let mut replies = self.expire(sender);
        let is_command = prefilter::is_command(text);

        if !is_command && vocab::is_cancel(text) {
            replies.push(self.cancel_reply(sender));
            return replies;
        }

        if !is_command {
            if self.pending_selections.get(sender).is_some() {
                replies.extend(self.handle_selection_reply(sender, text).await);
                return replies;
            }
            if let Some(pending) = self.pending_tasks.get(sender) {
                if pending.awaiting_conflict_decision {
                    replies.extend(self.handle_conflict_reply(sender, text).await);
                    return replies;
                }
                if !pending.is_waiting() {
                    self.pending_tasks.delete(sender);
                }
            }
            if let Some(turn) = self.conversation.handle_reply(sender, text).await {
                replies.extend(self.handle_turn(sender, turn).await);
                return replies;
            }
        }

        let history = self.recent_history(sender);
        let outcome = self.classifier.classify(text, sender, &history).await;
        self.remember(sender, text);
        info!(
            %sender,
            intent = ?outcome.result.intent,
            source = %outcome.result.source,
            confidence = outcome.result.confidence(),
            "Assistant::handle: classified"
        );

        match outcome.result.intent.clone() {
            Intent::Command(cmd) => replies.push(self.run_command(sender, &cmd).await),
            Intent::CreateTask => {
                let info = TaskInfo::from_fields(&outcome.result.fields);
                // Guesses from the fallback chain are confirmed before creation
                let confirm = outcome.result.source == ParseSource::Fallback;
                let turn = self.conversation.start(sender, info, text, confirm);
                replies.extend(self.handle_turn(sender, turn).await);
            }
            Intent::NotTask => replies.push(outcome.canned_reply.unwrap_or_else(|| UNCLEAR_REPLY.to_string())),
            Intent::Provide | Intent::Skip | Intent::Unclear => replies.push(UNCLEAR_REPLY.to_string()),
        }
        replies
    }

    /// Lazily expire every kind of pending state for the user
    fn expire(&self, user_id: &str) -> Vec<String> {
        let now = self.clock.now();
        let conversation_expired = self.conversation.check_expiry(user_id).is_some();
        let task_expired = self
            .pending_tasks
            .get(user_id)
            .is_some_and(|p| p.is_expired(now, self.session_timeout));
        let selection_expired = self
            .pending_selections
            .get(user_id)
            .is_some_and(|p| p.is_expired(now, self.session_timeout));

        if conversation_expired || task_expired || selection_expired {
            info!(%user_id, "Assistant: pending state expired");
            self.cancel_all(user_id);
            return vec![timeout_message(self.session_timeout)];
        }
        Vec::new()
    }

    /// Clear the pending task, conversation and selection together
    pub fn cancel_all(&self, user_id: &str) -> bool {
        let conversation = self.conversation.cancel(user_id);
        let task = self.pending_tasks.delete(user_id).is_some();
        let selection = self.pending_selections.delete(user_id).is_some();
        conversation || task || selection
    }

    fn cancel_reply(&self, user_id: &str) -> String {
        if self.cancel_all(user_id) {
            "Đã hủy thao tác đang dở.".to_string()
        } else {
            "Không có thao tác nào để hủy.".to_string()
        }
    }

    /// Drop sessions of every user that idled past the timeout
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut users = self.conversation.sweep_expired();
        users.extend(self.pending_tasks.sweep_expired(now, self.session_timeout));
        users.extend(self.pending_selections.sweep_expired(now, self.session_timeout));
        users.sort();
        users.dedup();
        for user in &users {
            self.cancel_all(user);
        }
        users
    }

    fn recent_history(&self, user_id: &str) -> Vec<String> {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history
            .get(user_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn remember(&self, user_id: &str, text: &str) {
        if self.history_size == 0 {
            return;
        }
        let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        let entries = history.entry(user_id.to_string()).or_default();
        entries.push_back(text.to_string());
        while entries.len() > self.history_size {
            entries.pop_front();
        }
    }

    async fn handle_turn(&self, user_id: &str, turn: Turn) -> Vec<String> {
        match turn {
            Turn::Complete { info, message } => {
                let pending = PendingTask::new(info, message, self.clock.now());
                vec![self.route(user_id, pending).await]
            }
            Turn::TimedOut { message } => {
                self.cancel_all(user_id);
                vec![message]
            }
            Turn::Prompt { message, .. } | Turn::Cancelled { message } => vec![message],
        }
    }

    async fn options(&self, kind: TargetKind) -> Vec<SelectionOption> {
        let listed = match kind {
            TargetKind::Calendar => with_timeout(self.service_timeout, self.calendar.list_calendars()).await,
            TargetKind::TaskList => with_timeout(self.service_timeout, self.calendar.list_task_lists()).await,
        };
        listed.unwrap_or_else(|e| {
            warn!(?kind, error = %e, "options: listing failed");
            Vec::new()
        })
    }

    /// Pick a destination, asking the user when the selector is unsure
    async fn route(&self, user_id: &str, mut pending: PendingTask) -> String {
        let calendars = self.options(TargetKind::Calendar).await;
        let task_lists = self.options(TargetKind::TaskList).await;
        let selection = self.selector.select(&pending.message, user_id, &calendars, &task_lists);
        debug!(?selection, "route: selected");

        if let Some(kind) = selection.kind() {
            let options = match kind {
                TargetKind::Calendar => calendars,
                TargetKind::TaskList => task_lists,
            };
            if !selection.auto_selected && options.len() > 1 {
                match kind {
                    TargetKind::Calendar => pending.awaiting_calendar_selection = true,
                    TargetKind::TaskList => pending.awaiting_task_list_selection = true,
                }
                let now = self.clock.now();
                let question = PendingSelection::new(kind, options, selection.target_id().map(str::to_string), now);
                let prompt = question.prompt();
                self.pending_selections.set(user_id, question);
                self.pending_tasks.set(user_id, pending);
                return prompt;
            }
        }

        pending.info.calendar_id = selection.calendar_id;
        pending.info.task_list_id = selection.task_list_id;
        self.schedule(user_id, pending).await
    }

    async fn handle_selection_reply(&self, user_id: &str, reply: &str) -> Vec<String> {
        let (Some(question), Some(mut pending)) = (self.pending_selections.get(user_id), self.pending_tasks.get(user_id))
        else {
            self.cancel_all(user_id);
            return vec![UNCLEAR_REPLY.to_string()];
        };
        let Some(choice) = question.choose(reply).cloned() else {
            let mut question = question;
            question.last_activity = self.clock.now();
            let prompt = format!("Vui lòng chọn theo số thứ tự.\n{}", question.prompt());
            self.pending_selections.set(user_id, question);
            return vec![prompt];
        };

        debug!(%user_id, id = %choice.id, "handle_selection_reply: chosen");
        self.pending_selections.delete(user_id);
        match choice.kind {
            TargetKind::Calendar => {
                pending.info.calendar_id = Some(choice.id);
                pending.info.task_list_id = None;
                pending.awaiting_calendar_selection = false;
            }
            TargetKind::TaskList => {
                pending.info.task_list_id = Some(choice.id);
                pending.info.calendar_id = None;
                pending.awaiting_task_list_selection = false;
            }
        }
        pending.touch(self.clock.now());
        vec![self.schedule(user_id, pending).await]
    }

    fn ensure_free(&self, user_id: &str, info: &TaskInfo) -> CoreResult<()> {
        match self.detector.check(info, user_id, self.store.as_ref())? {
            Some(result) if result.has_conflict => Err(CoreError::Conflict { result }),
            _ => Ok(()),
        }
    }

    /// Check the schedule, then create or ask how to resolve a conflict
    async fn schedule(&self, user_id: &str, mut pending: PendingTask) -> String {
        match self.ensure_free(user_id, &pending.info) {
            Ok(()) => self.create(user_id, pending).await,
            Err(CoreError::Conflict { result }) => {
                info!(%user_id, conflicts = result.conflicts.len(), "schedule: conflict");
                let reply = result.describe();
                pending.awaiting_conflict_decision = true;
                pending.conflict = Some(result);
                pending.touch(self.clock.now());
                self.pending_tasks.set(user_id, pending);
                reply
            }
            Err(e) => {
                warn!(%user_id, error = %e, "schedule: conflict check failed, creating anyway");
                self.create(user_id, pending).await
            }
        }
    }

    async fn handle_conflict_reply(&self, user_id: &str, reply: &str) -> Vec<String> {
        let Some(mut pending) = self.pending_tasks.get(user_id) else {
            return vec![UNCLEAR_REPLY.to_string()];
        };
        let suggestions = pending
            .conflict
            .as_ref()
            .map(|c| c.suggested_times.clone())
            .unwrap_or_default();

        if vocab::is_yes(reply) {
            pending.awaiting_conflict_decision = false;
            return vec![self.create(user_id, pending).await];
        }
        if vocab::is_no(reply) {
            self.cancel_all(user_id);
            return vec!["Đã hủy, không tạo lịch này.".to_string()];
        }

        let picked = reply
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| suggestions.get(i).copied())
            .or_else(|| temporal::parse_time(reply));
        let Some(new_start) = picked else {
            let again = pending.conflict.as_ref().map(|c| c.describe()).unwrap_or_default();
            return vec![format!("Mình chưa hiểu lựa chọn của bạn.\n{}", again)];
        };

        // Keep the original duration when moving the slot
        if let (Some(start), Some(end)) = (pending.info.time(), pending.info.end_time) {
            let duration = end - start;
            pending.info.end_time = Some(new_start + duration);
        }
        pending.info.set_time(new_start);
        pending.awaiting_conflict_decision = false;
        pending.conflict = None;
        pending.touch(self.clock.now());
        vec![self.schedule(user_id, pending).await]
    }

    /// Create the task externally and locally, learn, and set a reminder
    async fn create(&self, user_id: &str, pending: PendingTask) -> String {
        let info = pending.info;
        let external = if info.calendar_id.is_some() {
            with_timeout(self.service_timeout, self.calendar.create_event(&info)).await
        } else {
            with_timeout(self.service_timeout, self.calendar.create_task(&info)).await
        };

        let mut notes = Vec::new();
        let mut task = info.to_task(user_id);
        match external.map_err(CoreError::from) {
            Ok(id) => task.external_id = Some(id),
            Err(e) => {
                warn!(%user_id, error = %e, "create: external service failed, saving locally");
                notes.push("(chưa đồng bộ được với lịch, đã lưu cục bộ)".to_string());
            }
        }

        self.pending_tasks.delete(user_id);
        self.pending_selections.delete(user_id);
        if let Err(e) = self.store.insert_task(&task) {
            warn!(%user_id, error = %e, "create: store insert failed");
            return format!("Không lưu được công việc: {}", e);
        }
        self.selector.learn(
            user_id,
            &pending.message,
            info.calendar_id.as_deref(),
            info.task_list_id.as_deref(),
        );

        if let Some(trigger) = reminder_trigger(&info, self.reminder_lead_minutes, self.clock.now()) {
            match with_timeout(self.service_timeout, self.reminders.schedule_reminder(&info, trigger)).await {
                Ok(()) => notes.push(format!("⏰ Sẽ nhắc lúc {}", trigger.format("%H:%M %d/%m"))),
                Err(e) => warn!(%user_id, error = %e, "create: reminder not scheduled"),
            }
        }

        let kind = if info.calendar_id.is_some() { "lịch" } else { "công việc" };
        let mut reply = format!("✅ Đã tạo {}: {}", kind, info.summary());
        for note in notes {
            reply.push('\n');
            reply.push_str(&note);
        }
        info!(%user_id, title = %info.title, "create: done");
        reply
    }

    /// Open tasks in display order, remembered as the user's snapshot
    fn list_tasks(&self, user_id: &str, filter: TaskFilter) -> CoreResult<Vec<Task>> {
        let tasks = self.store.query_tasks(&filter, TaskOrder::Due)?;
        let mut snapshots = self.snapshots.lock().unwrap_or_else(|p| p.into_inner());
        snapshots.insert(user_id.to_string(), tasks.clone());
        Ok(tasks)
    }

    fn snapshot(&self, user_id: &str) -> CoreResult<Vec<Task>> {
        let cached = self
            .snapshots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(user_id)
            .cloned();
        match cached {
            Some(tasks) => Ok(tasks),
            None => self.list_tasks(user_id, TaskFilter::open_for_user(user_id)),
        }
    }

    async fn run_command(&self, user_id: &str, cmd: &CommandRequest) -> String {
        debug!(%user_id, ?cmd, "run_command: called");
        if cmd.kind.needs_args() && cmd.args.is_empty() {
            return format!("Lệnh này cần tham số.\n{}", HELP_TEXT);
        }
        let result = match &cmd.kind {
            CommandKind::Help => Ok(HELP_TEXT.to_string()),
            CommandKind::List => self
                .list_tasks(user_id, TaskFilter::open_for_user(user_id))
                .map(|tasks| format_list("📋 Danh sách công việc:", &tasks)),
            CommandKind::Today => self
                .list_tasks(user_id, TaskFilter::open_for_user(user_id).on_date(self.clock.today()))
                .map(|tasks| format_list("📅 Hôm nay:", &tasks)),
            CommandKind::Done => self.run_batch(user_id, &cmd.args, BatchOp::Complete),
            CommandKind::Delete => self.run_batch(user_id, &cmd.args, BatchOp::Delete),
            CommandKind::Edit => self.run_edit(user_id, &cmd.args).await,
            CommandKind::Cancel => Ok(self.cancel_reply(user_id)),
            CommandKind::Unknown(word) => Ok(format!("Không có lệnh /{}. Gõ /help để xem hướng dẫn.", word)),
        };
        result.unwrap_or_else(|e| describe_error(&e))
    }

    fn run_batch(&self, user_id: &str, args: &str, op: BatchOp) -> CoreResult<String> {
        let snapshot = self.snapshot(user_id)?;
        let references = parse_batch_references(args);
        let result = batch_apply(&references, op, &snapshot, self.store.as_ref());
        Ok(result.summary(op))
    }

    /// `/edit <field> <value>` while drafting, or `/edit <ref> <field> <value>`
    async fn run_edit(&self, user_id: &str, args: &str) -> CoreResult<String> {
        let mut words = args.splitn(2, char::is_whitespace);
        let first = words.next().unwrap_or_default();
        let rest = words.next().unwrap_or_default().trim();

        if self.conversation.is_active(user_id)
            && let Ok(field) = TaskField::from_str(first)
        {
            let state = self.conversation.state(user_id).map(|s| s.info).unwrap_or_default();
            let parsed = self.classifier.classify_field(rest, field, &state).await;
            if !parsed.fields.provides(field) {
                return Err(CoreError::Validation(format!("không đọc được {} từ \"{}\"", field.label(), rest)));
            }
            return match self.conversation.edit(user_id, &parsed.fields) {
                Some(turn) => Ok(self.handle_turn(user_id, turn).await.join("\n")),
                None => Err(CoreError::Validation("không có công việc nào đang soạn".to_string())),
            };
        }

        let mut words = rest.splitn(2, char::is_whitespace);
        let field_word = words.next().unwrap_or_default();
        let value = words.next().unwrap_or_default().trim();
        let field = TaskField::from_str(field_word).map_err(CoreError::Validation)?;
        if value.is_empty() {
            return Err(CoreError::Validation("thiếu giá trị mới".to_string()));
        }

        let snapshot = self.snapshot(user_id)?;
        let target = resolve_strict(first, &snapshot, false)?.task;
        let context = TaskInfo {
            title: target.title.clone(),
            task_type: target.task_type,
            ..Default::default()
        };
        let parsed = self.classifier.classify_field(value, field, &context).await;
        let fields = parsed.fields;
        let update = match field {
            TaskField::Title => TaskUpdate {
                title: fields.title,
                ..Default::default()
            },
            TaskField::Description => TaskUpdate {
                description: Some(value.to_string()),
                ..Default::default()
            },
            TaskField::Date => TaskUpdate {
                due_date: fields.date,
                ..Default::default()
            },
            TaskField::Time if target.task_type.is_scheduled() => TaskUpdate {
                start_time: fields.start_time,
                ..Default::default()
            },
            TaskField::Time => TaskUpdate {
                due_time: fields.start_time,
                ..Default::default()
            },
            TaskField::EndTime => TaskUpdate {
                end_time: fields.end_time,
                ..Default::default()
            },
            TaskField::Location => TaskUpdate {
                location: fields.location,
                ..Default::default()
            },
            TaskField::Attendees => {
                return Err(CoreError::Validation("chưa hỗ trợ sửa người tham dự".to_string()));
            }
        };
        if update.is_empty() {
            return Err(CoreError::Validation(format!("không đọc được {} từ \"{}\"", field.label(), value)));
        }
        if !self.store.update_task_fields(target.id, &update)? {
            return Err(CoreError::NotFound {
                reference: first.to_string(),
                candidates: Vec::new(),
            });
        }
        Ok(format!("✏️ Đã cập nhật {} của \"{}\".", field.label(), target.title))
    }
}

fn format_list(header: &str, tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "Bạn chưa có công việc nào.".to_string();
    }
    let mut lines = vec![header.to_string()];
    for (i, task) in tasks.iter().enumerate() {
        let mut line = format!("{}. {}", i + 1, task.title);
        if let Some(date) = task.due_date {
            line.push_str(&format!(" - {}", date.format("%d/%m")));
        }
        if let Some(time) = task.effective_start() {
            line.push_str(&format!(" {}", time.format("%H:%M")));
        }
        if task.completed {
            line.push_str(" ✓");
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn describe_error(err: &CoreError) -> String {
    match err {
        CoreError::NotFound { reference, candidates } if candidates.is_empty() => {
            format!("Không tìm thấy \"{}\".", reference)
        }
        CoreError::NotFound { reference, candidates } => format!(
            "Không tìm thấy \"{}\". Các công việc hiện có: {}",
            reference,
            candidates.join(", ")
        ),
        CoreError::Ambiguous { reference, candidates } => format!(
            "\"{}\" khớp nhiều công việc: {}. Hãy dùng số thứ tự.",
            reference,
            candidates.join(", ")
        ),
        CoreError::Validation(message) => format!("Không thực hiện được: {}.", message),
        other => format!("Có lỗi xảy ra: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::nlu::OfflineNlu;
    use crate::services::{ConsoleTransport, LoggingReminderScheduler, OfflineCalendarService};
    use chrono::{NaiveDate, NaiveTime};
    use taskstore::{MemoryStore, TaskType};

    struct Fixture {
        assistant: Assistant,
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        reminders: Arc<LoggingReminderScheduler>,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 9, 0));
        let reminders = Arc::new(LoggingReminderScheduler::new());
        let deps = Collaborators {
            nlu: Arc::new(OfflineNlu),
            store: store.clone(),
            calendar: Arc::new(OfflineCalendarService::from_config(&config.services)),
            reminders: reminders.clone(),
            transport: Arc::new(ConsoleTransport),
            clock: clock.clone(),
        };
        Fixture {
            assistant: Assistant::new(&config, deps),
            store,
            clock,
            reminders,
        }
    }

    fn all_tasks(store: &MemoryStore) -> Vec<Task> {
        store.query_tasks(&TaskFilter::for_user("u1"), TaskOrder::Created).unwrap()
    }

    #[tokio::test]
    async fn test_meeting_created_in_one_message() {
        let f = fixture();

        let replies = f.assistant.handle("u1", "Họp với khách hàng lúc 15:00 ngày mai").await;

        assert!(replies[0].starts_with("✅ Đã tạo lịch"), "{:?}", replies);
        let tasks = all_tasks(&f.store);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_type, TaskType::Meeting);
        assert_eq!(tasks[0].calendar_id.as_deref(), Some("primary"));
        assert!(tasks[0].external_id.is_some());
        assert_eq!(f.reminders.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn test_greeting_gets_canned_reply() {
        let f = fixture();
        let replies = f.assistant.handle("u1", "xin chào").await;
        assert!(replies[0].contains("Xin chào"));
        assert!(all_tasks(&f.store).is_empty());
    }

    #[tokio::test]
    async fn test_conflict_then_pick_suggestion() {
        let f = fixture();
        f.assistant.handle("u1", "Họp với An lúc 9:00 ngày mai").await;

        let replies = f.assistant.handle("u1", "Họp với Bình lúc 9:30 ngày mai").await;
        assert!(replies[0].contains("Trùng lịch"), "{:?}", replies);
        assert_eq!(all_tasks(&f.store).len(), 1);

        let replies = f.assistant.handle("u1", "1").await;
        assert!(replies[0].starts_with("✅"), "{:?}", replies);
        let tasks = all_tasks(&f.store);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].start_time, NaiveTime::from_hms_opt(11, 0, 0));
    }

    #[tokio::test]
    async fn test_conflict_proceed_anyway() {
        let f = fixture();
        f.assistant.handle("u1", "Họp với An lúc 9:00 ngày mai").await;
        f.assistant.handle("u1", "Họp với Bình lúc 9:30 ngày mai").await;

        let replies = f.assistant.handle("u1", "vẫn tạo").await;

        assert!(replies[0].starts_with("✅"));
        assert_eq!(all_tasks(&f.store)[1].start_time, NaiveTime::from_hms_opt(9, 30, 0));
    }

    #[tokio::test]
    async fn test_slot_filling_then_list_and_done() {
        let f = fixture();
        let replies = f.assistant.handle("u1", "Nhắc tôi mua sữa").await;
        assert!(replies[0].contains("ngày nào"), "{:?}", replies);

        let replies = f.assistant.handle("u1", "không cần").await;
        assert!(replies[0].starts_with("✅"), "{:?}", replies);

        let replies = f.assistant.handle("u1", "/list").await;
        assert!(replies[0].contains("1. Mua sữa"), "{:?}", replies);

        let replies = f.assistant.handle("u1", "/done 1").await;
        assert!(replies[0].contains("hoàn thành 1"));
        assert!(all_tasks(&f.store)[0].completed);
    }

    #[tokio::test]
    async fn test_umbrella_cancel_clears_everything() {
        let f = fixture();
        f.assistant.handle("u1", "Nhắc tôi mua sữa").await;

        let replies = f.assistant.handle("u1", "hủy").await;
        assert_eq!(replies, vec!["Đã hủy thao tác đang dở.".to_string()]);

        let replies = f.assistant.handle("u1", "/cancel").await;
        assert_eq!(replies, vec!["Không có thao tác nào để hủy.".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout_notice_then_fresh_handling() {
        let f = fixture();
        f.assistant.handle("u1", "Nhắc tôi mua sữa").await;

        f.clock.advance(chrono::Duration::minutes(6));
        let replies = f.assistant.handle("u1", "xin chào").await;

        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("hết hạn"));
        assert!(replies[1].contains("Xin chào"));
    }

    #[tokio::test]
    async fn test_edit_stored_task() {
        let f = fixture();
        f.assistant.handle("u1", "Nộp báo cáo trước thứ 6").await;
        f.assistant.handle("u1", "/list").await;

        let reply = f.assistant.handle("u1", "/edit 1 ngày thứ 5").await;

        assert!(reply[0].contains("Đã cập nhật"), "{:?}", reply);
        assert_eq!(all_tasks(&f.store)[0].due_date, NaiveDate::from_ymd_opt(2026, 10, 22));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let f = fixture();
        for i in 0..8 {
            f.assistant.remember("u1", &format!("m{}", i));
        }
        let history = f.assistant.recent_history("u1");
        assert_eq!(history, vec!["m3", "m4", "m5", "m6", "m7"]);
    }
}
