//! Apply one operation to a batch of task references

use std::collections::HashSet;

use serde::Serialize;
use taskstore::{DeletedRecord, Task, TaskStore, TaskUpdate};
use tracing::{debug, info, warn};

use super::resolver::resolve_strict;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOp {
    Complete,
    Delete,
}

impl BatchOp {
    fn verb(&self) -> &'static str {
        match self {
            Self::Complete => "hoàn thành",
            Self::Delete => "xóa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReferenceOutcome {
    Applied { task_id: i64, title: String },
    /// Resolved to a task already handled earlier in the batch
    Duplicate { task_id: i64 },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceDetail {
    pub reference: String,
    pub outcome: ReferenceOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub details: Vec<ReferenceDetail>,
}

impl BatchResult {
    fn push(&mut self, reference: &str, outcome: ReferenceOutcome) {
        match outcome {
            ReferenceOutcome::Applied { .. } => self.success_count += 1,
            ReferenceOutcome::Failed { .. } => self.failed_count += 1,
            ReferenceOutcome::Duplicate { .. } => {}
        }
        self.details.push(ReferenceDetail {
            reference: reference.to_string(),
            outcome,
        });
    }

    /// Reply text for the user
    pub fn summary(&self, op: BatchOp) -> String {
        let mut lines = Vec::new();
        if self.success_count > 0 {
            lines.push(format!("✅ Đã {} {} công việc:", op.verb(), self.success_count));
        }
        for detail in &self.details {
            match &detail.outcome {
                ReferenceOutcome::Applied { title, .. } => lines.push(format!("  • {}", title)),
                ReferenceOutcome::Failed { reason } => lines.push(format!("  ✗ \"{}\": {}", detail.reference, reason)),
                ReferenceOutcome::Duplicate { .. } => {}
            }
        }
        if lines.is_empty() {
            lines.push("Không có công việc nào được cập nhật.".to_string());
        }
        lines.join("\n")
    }
}

/// Resolve every reference, then apply `op` to the distinct tasks found
///
/// All references resolve against the same snapshot before anything is
/// mutated, so positions keep pointing at what the user saw.
pub fn batch_apply(references: &[String], op: BatchOp, snapshot: &[Task], store: &dyn TaskStore) -> BatchResult {
    debug!(?references, ?op, "batch_apply: called");
    let mut result = BatchResult::default();

    // Deleting on a guess is not reversible; completing is
    let allow_ambiguous = op == BatchOp::Complete;
    let resolved: Vec<(&String, Result<Task, CoreError>)> = references
        .iter()
        .map(|r| (r, resolve_strict(r, snapshot, allow_ambiguous).map(|res| res.task)))
        .collect();

    let mut seen = HashSet::new();
    for (reference, target) in resolved {
        let task = match target {
            Ok(task) => task,
            Err(e) => {
                result.push(reference, ReferenceOutcome::Failed { reason: describe(&e) });
                continue;
            }
        };
        if !seen.insert(task.id) {
            result.push(reference, ReferenceOutcome::Duplicate { task_id: task.id });
            continue;
        }
        let outcome = match apply_one(&task, op, store) {
            Ok(true) => ReferenceOutcome::Applied {
                task_id: task.id,
                title: task.title.clone(),
            },
            Ok(false) => ReferenceOutcome::Failed {
                reason: "công việc không còn tồn tại".to_string(),
            },
            Err(e) => {
                warn!(task_id = task.id, error = %e, "batch_apply: store error");
                ReferenceOutcome::Failed { reason: describe(&e) }
            }
        };
        result.push(reference, outcome);
    }

    info!(
        success = result.success_count,
        failed = result.failed_count,
        "batch_apply: done"
    );
    result
}

fn apply_one(task: &Task, op: BatchOp, store: &dyn TaskStore) -> Result<bool, CoreError> {
    match op {
        BatchOp::Complete => Ok(store.update_task_fields(task.id, &TaskUpdate::completed())?),
        BatchOp::Delete => {
            let Some(current) = store.get_task(task.id)? else {
                return Ok(false);
            };
            store.insert_deleted_record(&DeletedRecord::of(current))?;
            Ok(store.delete_task(task.id)?)
        }
    }
}

fn describe(err: &CoreError) -> String {
    match err {
        CoreError::NotFound { .. } => "không tìm thấy công việc".to_string(),
        CoreError::Ambiguous { candidates, .. } => {
            format!("khớp nhiều công việc ({}), hãy dùng số thứ tự", candidates.join(", "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskstore::{MemoryStore, TaskFilter, TaskOrder, TaskType};

    fn store_with(titles: &[&str]) -> (MemoryStore, Vec<Task>) {
        let store = MemoryStore::new();
        for title in titles {
            store.insert_task(&Task::new("u1", *title, TaskType::Task)).unwrap();
        }
        let snapshot = store
            .query_tasks(&TaskFilter::open_for_user("u1"), TaskOrder::Created)
            .unwrap();
        (store, snapshot)
    }

    fn refs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_delete_positions_are_stable() {
        let (store, snapshot) = store_with(&["A1", "B2", "C3", "D4", "E5"]);

        let result = batch_apply(&refs(&["1", "2", "3"]), BatchOp::Delete, &snapshot, &store);

        assert_eq!(result.success_count, 3);
        assert_eq!(result.failed_count, 0);
        let left: Vec<String> = store
            .query_tasks(&TaskFilter::for_user("u1"), TaskOrder::Created)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(left, vec!["D4".to_string(), "E5".to_string()]);
        assert_eq!(store.deleted_records("u1").unwrap().len(), 3);
    }

    #[test]
    fn test_duplicates_and_missing() {
        let (store, snapshot) = store_with(&["Mua sữa", "Gọi mẹ"]);

        let result = batch_apply(&refs(&["1", "mua sữa", "9"]), BatchOp::Complete, &snapshot, &store);

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failed_count, 1);
        assert!(matches!(result.details[1].outcome, ReferenceOutcome::Duplicate { .. }));
        let done = store.get_task(snapshot[0].id).unwrap().unwrap();
        assert!(done.completed);
    }

    #[test]
    fn test_delete_refuses_ambiguous_fuzzy() {
        let (store, snapshot) = store_with(&["Báo cáo quý", "Báo cáo tuần"]);

        let result = batch_apply(&refs(&["báo cáo tháng"]), BatchOp::Delete, &snapshot, &store);

        assert_eq!(result.success_count, 0);
        assert_eq!(result.failed_count, 1);
        assert_eq!(store.query_tasks(&TaskFilter::for_user("u1"), TaskOrder::Created).unwrap().len(), 2);
    }

    #[test]
    fn test_summary_lists_titles() {
        let (store, snapshot) = store_with(&["Mua sữa"]);
        let result = batch_apply(&refs(&["1"]), BatchOp::Complete, &snapshot, &store);
        let text = result.summary(BatchOp::Complete);
        assert!(text.contains("hoàn thành 1"));
        assert!(text.contains("Mua sữa"));
    }
}
