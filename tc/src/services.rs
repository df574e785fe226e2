//! External collaborators: chat transport, calendar service, reminders
//!
//! The assistant only depends on these traits. The default implementations
//! here keep everything in process so the binary runs without accounts.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use colored::Colorize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServicesConfig;
use crate::domain::TaskInfo;
use crate::selector::{SelectionOption, TargetKind};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unknown {kind} '{id}'")]
    UnknownTarget { kind: &'static str, id: String },

    #[error("Service rejected the request: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Run a service call under a hard timeout
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(timeout)),
    }
}

/// Outbound side of the chat channel
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, user_id: &str, text: &str) -> Result<(), ServiceError>;
}

/// Calendar and task-list backend
#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn list_calendars(&self) -> Result<Vec<SelectionOption>, ServiceError>;

    async fn list_task_lists(&self) -> Result<Vec<SelectionOption>, ServiceError>;

    /// Create a calendar event, returning its external id
    async fn create_event(&self, info: &TaskInfo) -> Result<String, ServiceError>;

    /// Create a task-list item, returning its external id
    async fn create_task(&self, info: &TaskInfo) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    async fn schedule_reminder(&self, info: &TaskInfo, trigger: NaiveDateTime) -> Result<(), ServiceError>;
}

/// When a reminder for `info` should fire
///
/// `lead_minutes` before the start (or due) time, or 08:00 on the date when
/// there is no time. None for undated entries and triggers already past.
pub fn reminder_trigger(info: &TaskInfo, lead_minutes: i64, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let date = info.due_date?;
    let trigger = match info.time() {
        Some(time) => date.and_time(time) - chrono::Duration::minutes(lead_minutes),
        None => date.and_time(NaiveTime::from_hms_opt(8, 0, 0)?),
    };
    (trigger > now).then_some(trigger)
}

/// Calendar service backed by the calendars declared in config
#[derive(Debug)]
pub struct OfflineCalendarService {
    calendars: Vec<SelectionOption>,
    task_lists: Vec<SelectionOption>,
    created: Mutex<Vec<(String, TaskInfo)>>,
}

impl OfflineCalendarService {
    pub fn from_config(config: &ServicesConfig) -> Self {
        let calendars = config
            .calendars
            .iter()
            .map(|c| SelectionOption {
                id: c.id.clone(),
                name: c.name.clone(),
                kind: TargetKind::Calendar,
                primary: c.primary,
            })
            .collect();
        let task_lists = config
            .task_lists
            .iter()
            .map(|l| SelectionOption {
                id: l.id.clone(),
                name: l.name.clone(),
                kind: TargetKind::TaskList,
                primary: false,
            })
            .collect();
        Self {
            calendars,
            task_lists,
            created: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, TaskInfo)>> {
        self.created.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Everything created so far, with its external id
    pub fn created(&self) -> Vec<(String, TaskInfo)> {
        self.lock().clone()
    }

    fn create(&self, target: Option<&str>, options: &[SelectionOption], kind: &'static str, info: &TaskInfo) -> Result<String, ServiceError> {
        if let Some(id) = target
            && !options.iter().any(|o| o.id == id)
        {
            return Err(ServiceError::UnknownTarget {
                kind,
                id: id.to_string(),
            });
        }
        let external_id = Uuid::now_v7().to_string();
        info!(%external_id, kind, title = %info.title, "OfflineCalendarService: created");
        self.lock().push((external_id.clone(), info.clone()));
        Ok(external_id)
    }
}

#[async_trait]
impl CalendarService for OfflineCalendarService {
    async fn list_calendars(&self) -> Result<Vec<SelectionOption>, ServiceError> {
        Ok(self.calendars.clone())
    }

    async fn list_task_lists(&self) -> Result<Vec<SelectionOption>, ServiceError> {
        Ok(self.task_lists.clone())
    }

    async fn create_event(&self, info: &TaskInfo) -> Result<String, ServiceError> {
        self.create(info.calendar_id.as_deref(), &self.calendars, "calendar", info)
    }

    async fn create_task(&self, info: &TaskInfo) -> Result<String, ServiceError> {
        self.create(info.task_list_id.as_deref(), &self.task_lists, "task list", info)
    }
}

/// Prints outgoing messages to the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTransport;

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_message(&self, user_id: &str, text: &str) -> Result<(), ServiceError> {
        debug!(%user_id, len = text.len(), "ConsoleTransport::send_message");
        println!("{} {}", "bot>".green().bold(), text);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledReminder {
    pub title: String,
    pub trigger: NaiveDateTime,
}

/// Records reminders and logs them; firing is left to the host
#[derive(Debug, Default)]
pub struct LoggingReminderScheduler {
    scheduled: Mutex<Vec<ScheduledReminder>>,
}

impl LoggingReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<ScheduledReminder> {
        self.scheduled.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ReminderScheduler for LoggingReminderScheduler {
    async fn schedule_reminder(&self, info: &TaskInfo, trigger: NaiveDateTime) -> Result<(), ServiceError> {
        info!(title = %info.title, %trigger, "reminder scheduled");
        self.scheduled
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(ScheduledReminder {
                title: info.title.clone(),
                trigger,
            });
        Ok(())
    }
}
