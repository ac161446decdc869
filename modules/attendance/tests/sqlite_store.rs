//! SQLite-backed document store: filter semantics, atomic partition
//! replacement, persistence across reconnects.

mod common;

use std::sync::Arc;
use std::time::Duration;

use attendance::contract::model::{
    AttendanceMark, AttendanceStatus, ClassInput, DayStatus, StudentInput,
};
use attendance::domain::store::{DocumentStore, Filter};
use attendance::infra::storage::SqliteStore;
use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;

async fn memory_store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:", None, None)
        .await
        .expect("in-memory sqlite")
}

fn file_dsn(dir: &TempDir) -> String {
    let path = dir.path().join("nested").join("attendance.db");
    format!("sqlite://{}", path.to_string_lossy().replace('\\', "/"))
}

#[tokio::test]
async fn insert_find_update_delete() {
    let store = memory_store().await;
    store
        .insert_many(
            "classes",
            vec![
                json!({"id": "c1", "teacher_id": "t1", "name": "A"}),
                json!({"id": "c2", "teacher_id": "t2", "name": "B"}),
                json!({"id": "c3", "teacher_id": "t1", "name": "C"}),
            ],
        )
        .await
        .unwrap();

    let own = store
        .find("classes", &Filter::all().eq("teacher_id", "t1"), 100)
        .await
        .unwrap();
    assert_eq!(own.len(), 2);
    // Insertion order is preserved.
    assert_eq!(own[0]["id"], "c1");
    assert_eq!(own[1]["id"], "c3");

    let limited = store.find("classes", &Filter::all(), 2).await.unwrap();
    assert_eq!(limited.len(), 2);

    let updated = store
        .update_one(
            "classes",
            &Filter::all().eq("id", "c2"),
            json!({"id": "c2", "teacher_id": "t1", "name": "B2"}),
        )
        .await
        .unwrap();
    assert!(updated);
    let missing = store
        .update_one("classes", &Filter::all().eq("id", "nope"), json!({"id": "nope"}))
        .await
        .unwrap();
    assert!(!missing);

    let removed = store
        .delete_many("classes", &Filter::all().eq("teacher_id", "t1"))
        .await
        .unwrap();
    assert_eq!(removed, 3);
    assert!(store
        .find("classes", &Filter::all(), 100)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn collections_are_isolated() {
    let store = memory_store().await;
    store
        .insert_many("students", vec![json!({"id": "s1"})])
        .await
        .unwrap();
    assert!(store
        .find("classes", &Filter::all(), 10)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.delete_many("classes", &Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn date_range_filter_is_inclusive() {
    let store = memory_store().await;
    let rows = ["2024-01-09", "2024-01-10", "2024-01-11", "2024-01-12"]
        .iter()
        .map(|d| json!({"class_id": "c1", "date": d}))
        .collect();
    store.insert_many("attendance", rows).await.unwrap();

    let hits = store
        .find(
            "attendance",
            &Filter::all().eq("class_id", "c1").between("date", "2024-01-10", "2024-01-11"),
            100,
        )
        .await
        .unwrap();
    let dates: Vec<_> = hits.iter().map(|d| d["date"].as_str().unwrap()).collect();
    assert_eq!(dates, ["2024-01-10", "2024-01-11"]);
}

#[tokio::test]
async fn replace_where_swaps_partition() {
    let store = memory_store().await;
    let partition = Filter::all().eq("class_id", "c1").eq("date", "2024-03-01");
    store
        .insert_many(
            "attendance",
            vec![
                json!({"class_id": "c1", "date": "2024-03-01", "student_id": "s1"}),
                json!({"class_id": "c1", "date": "2024-03-01", "student_id": "s2"}),
                json!({"class_id": "c1", "date": "2024-03-02", "student_id": "s1"}),
            ],
        )
        .await
        .unwrap();

    let removed = store
        .replace_where(
            "attendance",
            &partition,
            vec![json!({"class_id": "c1", "date": "2024-03-01", "student_id": "s3"})],
        )
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let day = store.find("attendance", &partition, 100).await.unwrap();
    assert_eq!(day.len(), 1);
    assert_eq!(day[0]["student_id"], "s3");
    assert_eq!(
        store
            .find("attendance", &Filter::all(), 100)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn file_database_survives_reconnect() {
    let dir = TempDir::new().unwrap();
    let dsn = file_dsn(&dir);

    let store = SqliteStore::connect(&dsn, Some(4), Some(Duration::from_millis(2000)))
        .await
        .unwrap();
    store
        .insert_many("users", vec![json!({"id": "u1", "email": "a@b.c"})])
        .await
        .unwrap();
    store.close().await;

    assert!(dir.path().join("nested").join("attendance.db").exists());

    let reopened = SqliteStore::connect(&dsn, None, None).await.unwrap();
    let users = reopened
        .find("users", &Filter::all().eq("email", "a@b.c"), 10)
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], "u1");
}

#[tokio::test]
async fn module_runs_over_sqlite() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::connect(&file_dsn(&dir), None, None)
            .await
            .unwrap(),
    );
    let module = common::module_over(store);

    let teacher = common::register(&module, "tess", "teacher").await;
    let class = module
        .registry
        .create_class(
            &teacher.user,
            ClassInput {
                name: "7B".into(),
                subject: "Math".into(),
                teacher_id: teacher.user.id.clone(),
            },
        )
        .await
        .unwrap();
    let student = module
        .registry
        .create_student(
            &teacher.user,
            StudentInput {
                name: "Ann".into(),
                email: "ann@pupils.test".into(),
                class_id: class.id.clone(),
                roll_number: "1".into(),
            },
        )
        .await
        .unwrap();

    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    for status in [AttendanceStatus::Absent, AttendanceStatus::Late] {
        let written = module
            .ledger
            .bulk_mark(
                &teacher.user,
                &class.id,
                date,
                vec![AttendanceMark {
                    student_id: student.id.clone(),
                    status,
                }],
            )
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    let entries = module
        .ledger
        .get_attendance(&teacher.user, &class.id, date)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, DayStatus::Late);

    let login = module
        .auth
        .login("tess@school.test", "tess-password")
        .await
        .unwrap();
    assert_eq!(login.user.id, teacher.user.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bulk_marks_are_atomic_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::connect(&file_dsn(&dir), Some(4), Some(Duration::from_secs(5)))
        .await
        .unwrap();
    let rows = common::race_bulk_marks(Arc::new(store)).await;
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["status"] == rows[0]["status"]));
}
