//! SQLite TaskStore backend

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::{TaskFilter, TaskOrder, TaskStore};
use crate::task::{DeletedRecord, Task, TaskType, TaskUpdate};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";

const COLUMNS: &str = "id, user_id, title, description, due_date, due_time, start_time, end_time, location, \
                       attendees, task_type, calendar_id, task_list_id, external_id, completed, created_at, updated_at";

/// Durable store backed by a single SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "SqliteStore::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        info!(path = %path.display(), "Opened task database");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      TEXT NOT NULL,
                title        TEXT NOT NULL,
                description  TEXT,
                due_date     TEXT,
                due_time     TEXT,
                start_time   TEXT,
                end_time     TEXT,
                location     TEXT,
                attendees    TEXT NOT NULL DEFAULT '[]',
                task_type    TEXT NOT NULL DEFAULT 'task',
                calendar_id  TEXT,
                task_list_id TEXT,
                external_id  TEXT,
                completed    INTEGER NOT NULL DEFAULT 0,
                created_at   INTEGER NOT NULL,
                updated_at   INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deleted_tasks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                snapshot    TEXT NOT NULL,
                deleted_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user_completed ON tasks(user_id, completed);
            CREATE INDEX IF NOT EXISTS idx_tasks_user_due_date ON tasks(user_id, due_date);
            CREATE INDEX IF NOT EXISTS idx_deleted_user ON deleted_tasks(user_id);",
        )
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Row as stored, before typed conversion
struct RawTask {
    id: i64,
    user_id: String,
    title: String,
    description: Option<String>,
    due_date: Option<String>,
    due_time: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    attendees: String,
    task_type: String,
    calendar_id: Option<String>,
    task_list_id: Option<String>,
    external_id: Option<String>,
    completed: bool,
    created_at: i64,
    updated_at: i64,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            due_date: row.get(4)?,
            due_time: row.get(5)?,
            start_time: row.get(6)?,
            end_time: row.get(7)?,
            location: row.get(8)?,
            attendees: row.get(9)?,
            task_type: row.get(10)?,
            calendar_id: row.get(11)?,
            task_list_id: row.get(12)?,
            external_id: row.get(13)?,
            completed: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_task(self) -> Result<Task, StoreError> {
        let id = self.id;
        let corrupt = |message: String| StoreError::Corrupt { id, message };

        let task_type: TaskType = self.task_type.parse().map_err(corrupt)?;
        let attendees: Vec<String> = serde_json::from_str(&self.attendees)
            .map_err(|e| StoreError::Corrupt { id, message: e.to_string() })?;

        Ok(Task {
            id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            due_date: parse_date(id, self.due_date.as_deref())?,
            due_time: parse_time(id, self.due_time.as_deref())?,
            start_time: parse_time(id, self.start_time.as_deref())?,
            end_time: parse_time(id, self.end_time.as_deref())?,
            location: self.location,
            attendees,
            task_type,
            calendar_id: self.calendar_id,
            task_list_id: self.task_list_id,
            external_id: self.external_id,
            completed: self.completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_date(id: i64, value: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
    value
        .map(|s| NaiveDate::parse_from_str(s, DATE_FMT))
        .transpose()
        .map_err(|e| StoreError::Corrupt { id, message: format!("bad date: {}", e) })
}

fn parse_time(id: i64, value: Option<&str>) -> Result<Option<NaiveTime>, StoreError> {
    value
        .map(|s| NaiveTime::parse_from_str(s, TIME_FMT))
        .transpose()
        .map_err(|e| StoreError::Corrupt { id, message: format!("bad time: {}", e) })
}

fn fmt_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FMT).to_string())
}

fn fmt_time(time: Option<NaiveTime>) -> Option<String> {
    time.map(|t| t.format(TIME_FMT).to_string())
}

fn write_task(conn: &Connection, task: &Task) -> Result<(), StoreError> {
    let attendees = serde_json::to_string(&task.attendees)?;
    conn.execute(
        "UPDATE tasks SET title = ?2, description = ?3, due_date = ?4, due_time = ?5, start_time = ?6,
                end_time = ?7, location = ?8, attendees = ?9, task_type = ?10, calendar_id = ?11,
                task_list_id = ?12, external_id = ?13, completed = ?14, updated_at = ?15
         WHERE id = ?1",
        params![
            task.id,
            task.title,
            task.description,
            fmt_date(task.due_date),
            fmt_time(task.due_time),
            fmt_time(task.start_time),
            fmt_time(task.end_time),
            task.location,
            attendees,
            task.task_type.as_str(),
            task.calendar_id,
            task.task_list_id,
            task.external_id,
            task.completed,
            task.updated_at,
        ],
    )?;
    Ok(())
}

fn read_task(conn: &Connection, id: i64) -> Result<Option<Task>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", COLUMNS),
            params![id],
            RawTask::from_row,
        )
        .optional()?;
    raw.map(RawTask::into_task).transpose()
}

impl TaskStore for SqliteStore {
    fn insert_task(&self, task: &Task) -> Result<i64, StoreError> {
        debug!(user_id = %task.user_id, title = %task.title, "SqliteStore::insert_task: called");
        if task.title.trim().is_empty() {
            return Err(StoreError::Invalid("task title is empty".to_string()));
        }
        let attendees = serde_json::to_string(&task.attendees)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tasks (user_id, title, description, due_date, due_time, start_time, end_time, location,
                                attendees, task_type, calendar_id, task_list_id, external_id, completed,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                task.user_id,
                task.title,
                task.description,
                fmt_date(task.due_date),
                fmt_time(task.due_time),
                fmt_time(task.start_time),
                fmt_time(task.end_time),
                task.location,
                attendees,
                task.task_type.as_str(),
                task.calendar_id,
                task.task_list_id,
                task.external_id,
                task.completed,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        read_task(&self.lock(), id)
    }

    fn query_tasks(&self, filter: &TaskFilter, order: TaskOrder) -> Result<Vec<Task>, StoreError> {
        debug!(?filter, ?order, "SqliteStore::query_tasks: called");
        let mut sql = format!("SELECT {} FROM tasks WHERE 1 = 1", COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(user_id) = &filter.user_id {
            values.push(Value::Text(user_id.clone()));
            sql.push_str(&format!(" AND user_id = ?{}", values.len()));
        }
        if let Some(completed) = filter.completed {
            values.push(Value::Integer(i64::from(completed)));
            sql.push_str(&format!(" AND completed = ?{}", values.len()));
        }
        if let Some(date) = filter.due_date {
            values.push(Value::Text(date.format(DATE_FMT).to_string()));
            sql.push_str(&format!(" AND due_date = ?{}", values.len()));
        }
        if !filter.task_types.is_empty() {
            let mut placeholders = Vec::new();
            for task_type in &filter.task_types {
                values.push(Value::Text(task_type.as_str().to_string()));
                placeholders.push(format!("?{}", values.len()));
            }
            sql.push_str(&format!(" AND task_type IN ({})", placeholders.join(", ")));
        }

        sql.push_str(match order {
            TaskOrder::Created => " ORDER BY created_at ASC, id ASC",
            TaskOrder::Due => {
                " ORDER BY due_date IS NULL, due_date ASC, COALESCE(start_time, due_time) IS NULL, \
                 COALESCE(start_time, due_time) ASC, created_at ASC, id ASC"
            }
        });

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(values), RawTask::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawTask::into_task).collect()
    }

    fn update_task_fields(&self, id: i64, update: &TaskUpdate) -> Result<bool, StoreError> {
        debug!(id, ?update, "SqliteStore::update_task_fields: called");
        let conn = self.lock();
        let Some(mut task) = read_task(&conn, id)? else {
            return Ok(false);
        };
        update.apply(&mut task);
        write_task(&conn, &task)?;
        Ok(true)
    }

    fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        debug!(id, "SqliteStore::delete_task: called");
        let changed = self.lock().execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn insert_deleted_record(&self, record: &DeletedRecord) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(&record.task)?;
        self.lock().execute(
            "INSERT INTO deleted_tasks (user_id, snapshot, deleted_at) VALUES (?1, ?2, ?3)",
            params![record.task.user_id, snapshot, record.deleted_at],
        )?;
        Ok(())
    }

    fn deleted_records(&self, user_id: &str) -> Result<Vec<DeletedRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT snapshot, deleted_at FROM deleted_tasks WHERE user_id = ?1 ORDER BY id DESC")?;
        let rows = stmt
            .query_map(params![user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(snapshot, deleted_at)| {
                Ok(DeletedRecord {
                    task: serde_json::from_str(&snapshot)?,
                    deleted_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting() -> Task {
        let mut task = Task::new("u1", "Họp với khách hàng", TaskType::Meeting)
            .with_due_date(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap())
            .with_times(NaiveTime::from_hms_opt(15, 0, 0).unwrap(), None);
        task.attendees = vec!["khách hàng".to_string()];
        task
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_task(&meeting()).unwrap();

        let loaded = store.get_task(id).unwrap().unwrap();
        let mut expected = meeting();
        expected.id = id;
        expected.created_at = loaded.created_at;
        expected.updated_at = loaded.updated_at;
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_query_filters_and_orders() {
        let store = SqliteStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

        let undated = Task::new("u1", "Đọc sách", TaskType::Task);
        let late = Task::new("u1", "Gym", TaskType::Calendar)
            .with_due_date(date)
            .with_times(NaiveTime::from_hms_opt(18, 0, 0).unwrap(), None);
        let early = Task::new("u1", "Standup", TaskType::Calendar)
            .with_due_date(date)
            .with_times(NaiveTime::from_hms_opt(9, 0, 0).unwrap(), None);
        let other = Task::new("u2", "Khác", TaskType::Task);

        for task in [&undated, &late, &early, &other] {
            store.insert_task(task).unwrap();
        }

        let tasks = store.query_tasks(&TaskFilter::for_user("u1"), TaskOrder::Due).unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Standup", "Gym", "Đọc sách"]);

        let scheduled = store
            .query_tasks(
                &TaskFilter::for_user("u1").on_date(date).of_types(&[TaskType::Calendar]),
                TaskOrder::Created,
            )
            .unwrap();
        assert_eq!(scheduled.len(), 2);
    }

    #[test]
    fn test_update_delete_and_deleted_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_task(&meeting()).unwrap();

        assert!(store.update_task_fields(id, &TaskUpdate::completed()).unwrap());
        let task = store.get_task(id).unwrap().unwrap();
        assert!(task.completed);

        assert!(store.delete_task(id).unwrap());
        assert!(store.get_task(id).unwrap().is_none());
        store.insert_deleted_record(&DeletedRecord::of(task.clone())).unwrap();

        let deleted = store.deleted_records("u1").unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].task, task);
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tasks.db");
        let store = SqliteStore::open(&path).unwrap();
        store.insert_task(&Task::new("u1", "x", TaskType::Task)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_insert_rejects_empty_title() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.insert_task(&Task::new("u1", "   ", TaskType::Task));
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }
}
