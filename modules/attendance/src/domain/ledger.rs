use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::contract::model::{
    AttendanceEntry, AttendanceMark, AttendanceRecord, Class, DayStatus, Student, User,
};
use crate::domain::error::DomainError;
use crate::domain::registry::authorize_class;
use crate::domain::store::{Collection, Filter};

/// Per-day attendance: whole-partition replace on write, joined with the
/// class roster on read.
pub struct LedgerService {
    classes: Collection<Class>,
    students: Collection<Student>,
    attendance: Collection<AttendanceRecord>,
    list_limit: usize,
}

pub(crate) fn partition(class_id: &str, date: NaiveDate) -> Filter {
    Filter::all()
        .eq("class_id", class_id)
        .eq("date", date.to_string())
}

impl LedgerService {
    pub fn new(
        classes: Collection<Class>,
        students: Collection<Student>,
        attendance: Collection<AttendanceRecord>,
        list_limit: usize,
    ) -> Self {
        Self {
            classes,
            students,
            attendance,
            list_limit,
        }
    }

    /// Replace the (class, date) partition with `marks`. Returns the number of rows written.
    #[instrument(name = "attendance.ledger.bulk_mark", skip(self, actor, marks), fields(actor = %actor.id, count = marks.len()))]
    pub async fn bulk_mark(
        &self,
        actor: &User,
        class_id: &str,
        date: NaiveDate,
        marks: Vec<AttendanceMark>,
    ) -> Result<usize, DomainError> {
        authorize_class(
            &self.classes,
            actor,
            class_id,
            "Not authorized to mark attendance for this class",
        )
        .await?;

        let now = Utc::now();
        let rows: Vec<AttendanceRecord> = marks
            .into_iter()
            .map(|mark| AttendanceRecord {
                id: Uuid::new_v4().to_string(),
                class_id: class_id.to_owned(),
                student_id: mark.student_id,
                date,
                status: mark.status,
                created_at: now,
            })
            .collect();

        let replaced = self
            .attendance
            .replace_where(&partition(class_id, date), &rows)
            .await?;
        info!(replaced, written = rows.len(), "attendance partition replaced");
        Ok(rows.len())
    }

    /// One entry per current student of the class, `not_marked` when no row exists.
    pub async fn get_attendance(
        &self,
        actor: &User,
        class_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEntry>, DomainError> {
        authorize_class(
            &self.classes,
            actor,
            class_id,
            "Not authorized to view attendance for this class",
        )
        .await?;

        let students = self
            .students
            .find_limited(&Filter::all().eq("class_id", class_id), self.list_limit)
            .await?;
        let rows = self.attendance.find(&partition(class_id, date)).await?;
        let by_student: HashMap<String, _> = rows
            .into_iter()
            .map(|r| (r.student_id, r.status))
            .collect();

        Ok(students
            .into_iter()
            .map(|s| AttendanceEntry {
                status: DayStatus::from(by_student.get(&s.id).copied()),
                student_id: s.id,
                student_name: s.name,
                roll_number: s.roll_number,
            })
            .collect())
    }
}
