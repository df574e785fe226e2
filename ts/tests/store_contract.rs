//! Behavior every TaskStore backend must share

use chrono::{NaiveDate, NaiveTime};
use taskstore::{DeletedRecord, MemoryStore, SqliteStore, Task, TaskFilter, TaskOrder, TaskStore, TaskType, TaskUpdate};
use tempfile::TempDir;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
}

fn time(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).expect("valid time")
}

fn exercise(store: &dyn TaskStore) {
    let report = store
        .insert_task(&Task::new("u1", "Nộp báo cáo", TaskType::Task).with_due_date(date(23)))
        .expect("insert report");
    let meeting = store
        .insert_task(
            &Task::new("u1", "Họp nhóm", TaskType::Meeting)
                .with_due_date(date(20))
                .with_times(time(9), Some(time(10))),
        )
        .expect("insert meeting");
    store
        .insert_task(&Task::new("u1", "Mua sữa", TaskType::Task))
        .expect("insert undated");
    store
        .insert_task(&Task::new("u2", "Việc của người khác", TaskType::Task))
        .expect("insert other user");
    assert_ne!(report, meeting);

    // Due order: dated entries first, earliest first
    let open = store
        .query_tasks(&TaskFilter::open_for_user("u1"), TaskOrder::Due)
        .expect("query open");
    let titles: Vec<&str> = open.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Họp nhóm", "Nộp báo cáo", "Mua sữa"]);

    let on_day = store
        .query_tasks(
            &TaskFilter::open_for_user("u1")
                .on_date(date(20))
                .of_types(&[TaskType::Calendar, TaskType::Meeting]),
            TaskOrder::Due,
        )
        .expect("query day");
    assert_eq!(on_day.len(), 1);
    assert_eq!(on_day[0].end_time, Some(time(10)));

    assert!(store.update_task_fields(report, &TaskUpdate::completed()).expect("complete"));
    let open = store
        .query_tasks(&TaskFilter::open_for_user("u1"), TaskOrder::Due)
        .expect("query open");
    assert_eq!(open.len(), 2);
    let all = store
        .query_tasks(&TaskFilter::for_user("u1"), TaskOrder::Created)
        .expect("query all");
    assert_eq!(all.len(), 3);

    let snapshot = store.get_task(meeting).expect("get").expect("meeting exists");
    store
        .insert_deleted_record(&DeletedRecord::of(snapshot))
        .expect("record deletion");
    assert!(store.delete_task(meeting).expect("delete"));
    assert!(!store.delete_task(meeting).expect("delete twice"));
    assert!(store.get_task(meeting).expect("get deleted").is_none());

    let records = store.deleted_records("u1").expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].task.title, "Họp nhóm");
    assert!(store.deleted_records("u2").expect("records").is_empty());
}

#[test]
fn test_memory_store_contract() {
    exercise(&MemoryStore::new());
}

#[test]
fn test_sqlite_in_memory_contract() {
    exercise(&SqliteStore::open_in_memory().expect("open in-memory sqlite"));
}

#[test]
fn test_sqlite_file_contract() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = SqliteStore::open(temp_dir.path().join("nested").join("tasks.db")).expect("open sqlite");
    exercise(&store);
}
