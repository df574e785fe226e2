//! In-memory TaskStore backend

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::StoreError;
use crate::store::{TaskFilter, TaskOrder, TaskStore, sort_tasks};
use crate::task::{DeletedRecord, Task, TaskUpdate};

#[derive(Debug, Default)]
struct Inner {
    tasks: Vec<Task>,
    deleted: Vec<DeletedRecord>,
    next_id: i64,
}

/// Process-local store; contents are lost on drop
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for MemoryStore {
    fn insert_task(&self, task: &Task) -> Result<i64, StoreError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let mut stored = task.clone();
        stored.id = id;
        debug!(id, user_id = %stored.user_id, "MemoryStore::insert_task");
        inner.tasks.push(stored);
        Ok(id)
    }

    fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.lock().tasks.iter().find(|t| t.id == id).cloned())
    }

    fn query_tasks(&self, filter: &TaskFilter, order: TaskOrder) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.lock().tasks.iter().filter(|t| filter.matches(t)).cloned().collect();
        sort_tasks(&mut tasks, order);
        Ok(tasks)
    }

    fn update_task_fields(&self, id: i64, update: &TaskUpdate) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                update.apply(task);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        Ok(inner.tasks.len() < before)
    }

    fn insert_deleted_record(&self, record: &DeletedRecord) -> Result<(), StoreError> {
        self.lock().deleted.push(record.clone());
        Ok(())
    }

    fn deleted_records(&self, user_id: &str) -> Result<Vec<DeletedRecord>, StoreError> {
        let mut records: Vec<DeletedRecord> = self
            .lock()
            .deleted
            .iter()
            .filter(|r| r.task.user_id == user_id)
            .cloned()
            .collect();
        records.reverse();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskType;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.insert_task(&Task::new("u1", "a", TaskType::Task)).unwrap();
        let b = store.insert_task(&Task::new("u1", "b", TaskType::Task)).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.get_task(b).unwrap().unwrap().title, "b");
    }

    #[test]
    fn test_delete_and_snapshot() {
        let store = MemoryStore::new();
        let id = store.insert_task(&Task::new("u1", "a", TaskType::Task)).unwrap();
        let task = store.get_task(id).unwrap().unwrap();

        assert!(store.delete_task(id).unwrap());
        assert!(!store.delete_task(id).unwrap());
        store.insert_deleted_record(&DeletedRecord::of(task)).unwrap();

        assert_eq!(store.deleted_records("u1").unwrap().len(), 1);
        assert!(store.deleted_records("u2").unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_returns_false() {
        let store = MemoryStore::new();
        assert!(!store.update_task_fields(42, &TaskUpdate::completed()).unwrap());
    }
}
