#![allow(dead_code)]

use std::sync::Arc;

use argon2::Params;
use attendance::contract::model::{
    AttendanceMark, AttendanceRecord, AttendanceStatus, AuthSession, ClassInput, Document,
    NewUser, StudentInput,
};
use attendance::domain::store::{DocumentStore, Filter};
use chrono::NaiveDate;
use attendance::infra::credentials::{Argon2Hasher, JwtCodec};
use attendance::infra::storage::InMemoryStore;
use attendance::{Attendance, AttendanceConfig};

pub const REPORT_MAX_DAYS: u32 = 31;

/// Module over a fresh in-memory store with cheap hashing parameters.
pub fn module() -> Attendance {
    module_over(Arc::new(InMemoryStore::new()))
}

pub fn module_over(store: Arc<dyn DocumentStore>) -> Attendance {
    let hasher = Argon2Hasher::with_params(Params::new(1024, 1, 1, None).expect("argon2 params"));
    Attendance::with_components(
        store,
        Arc::new(hasher),
        Arc::new(JwtCodec::new(b"integration-test-secret", None)),
        &AttendanceConfig {
            report_max_days: REPORT_MAX_DAYS,
            ..AttendanceConfig::default()
        },
    )
}

pub async fn register(module: &Attendance, name: &str, role: &str) -> AuthSession {
    module
        .auth
        .register(NewUser {
            username: name.to_string(),
            email: format!("{name}@school.test"),
            password: format!("{name}-password"),
            role: role.to_string(),
        })
        .await
        .expect("registration should succeed")
}

/// Sixteen tasks bulk-mark the same class-day of a three-student class at
/// once. Returns the raw stored rows for that day.
pub async fn race_bulk_marks(store: Arc<dyn DocumentStore>) -> Vec<serde_json::Value> {
    let module = module_over(store.clone());
    let teacher = register(&module, "racer", "teacher").await.user;
    let class = module
        .registry
        .create_class(
            &teacher,
            ClassInput {
                name: "Relay".into(),
                subject: "PE".into(),
                teacher_id: teacher.id.clone(),
            },
        )
        .await
        .expect("class");
    let mut student_ids = Vec::new();
    for roll in 1..=3 {
        let student = module
            .registry
            .create_student(
                &teacher,
                StudentInput {
                    name: format!("Runner {roll}"),
                    email: format!("runner{roll}@pupils.test"),
                    class_id: class.id.clone(),
                    roll_number: roll.to_string(),
                },
            )
            .await
            .expect("student");
        student_ids.push(student.id);
    }

    let date = NaiveDate::from_ymd_opt(2024, 5, 6).expect("date");
    let statuses = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
    ];
    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let module = module.clone();
            let teacher = teacher.clone();
            let class_id = class.id.clone();
            let marks: Vec<_> = student_ids
                .iter()
                .map(|id| AttendanceMark {
                    student_id: id.clone(),
                    status: statuses[i % statuses.len()],
                })
                .collect();
            tokio::spawn(async move {
                module
                    .ledger
                    .bulk_mark(&teacher, &class_id, date, marks)
                    .await
            })
        })
        .collect();
    for task in tasks {
        let written = task.await.expect("join").expect("bulk mark");
        assert_eq!(written, 3);
    }

    store
        .find(
            AttendanceRecord::COLLECTION,
            &Filter::all()
                .eq("class_id", class.id.as_str())
                .eq("date", date.to_string()),
            usize::MAX,
        )
        .await
        .expect("raw rows")
}
