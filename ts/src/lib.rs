//! TaskStore - typed task persistence for taskchat
//!
//! Every row that crosses the persistence boundary is mapped to a single
//! strongly-typed [`Task`] record. Callers program against the [`TaskStore`]
//! trait; two backends are provided:
//!
//! - [`SqliteStore`] - durable storage in a single SQLite file
//! - [`MemoryStore`] - process-local storage for tests and ephemeral runs

mod error;
mod memory;
mod sqlite;
mod store;
mod task;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{TaskFilter, TaskOrder, TaskStore, sort_tasks};
pub use task::{DeletedRecord, Task, TaskType, TaskUpdate};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
