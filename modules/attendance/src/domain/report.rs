use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::contract::model::{AttendanceRecord, Class, CsvReport, DayStatus, Student, User};
use crate::domain::error::DomainError;
use crate::domain::registry::authorize_class;
use crate::domain::store::{Collection, Filter};

const FIXED_COLUMNS: [&str; 2] = ["Student Name", "Roll Number"];

/// Inclusive day sequence; empty when `start > end`.
pub fn iter_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Reject ranges wider than `max_days`. An inverted range spans zero days.
pub fn check_span(start: NaiveDate, end: NaiveDate, max_days: u32) -> Result<(), DomainError> {
    let days = (end - start).num_days().saturating_add(1);
    if days > i64::from(max_days) {
        return Err(DomainError::validation(
            "end_date",
            format!("report range may span at most {max_days} days"),
        ));
    }
    Ok(())
}

/// Dense student x day matrix. Students keep the given order.
pub fn render_csv(
    students: &[Student],
    records: &[AttendanceRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<u8>> {
    let days: Vec<String> = iter_days(start, end).map(|d| d.to_string()).collect();
    let marks: HashMap<(&str, String), DayStatus> = records
        .iter()
        .map(|r| {
            (
                (r.student_id.as_str(), r.date.to_string()),
                DayStatus::from(Some(r.status)),
            )
        })
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(FIXED_COLUMNS.iter().copied().chain(days.iter().map(String::as_str)))?;

    for student in students {
        let mut row = Vec::with_capacity(FIXED_COLUMNS.len() + days.len());
        row.push(student.name.as_str());
        row.push(student.roll_number.as_str());
        for day in &days {
            let status = marks
                .get(&(student.id.as_str(), day.clone()))
                .copied()
                .unwrap_or(DayStatus::NotMarked);
            row.push(status.as_str());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to finish CSV output: {e}"))
}

pub struct ReportService {
    classes: Collection<Class>,
    students: Collection<Student>,
    attendance: Collection<AttendanceRecord>,
    list_limit: usize,
    max_days: u32,
}

impl ReportService {
    pub fn new(
        classes: Collection<Class>,
        students: Collection<Student>,
        attendance: Collection<AttendanceRecord>,
        list_limit: usize,
        max_days: u32,
    ) -> Self {
        Self {
            classes,
            students,
            attendance,
            list_limit,
            max_days,
        }
    }

    #[instrument(name = "attendance.report.generate_csv", skip(self, actor), fields(actor = %actor.id))]
    pub async fn generate_csv(
        &self,
        actor: &User,
        class_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CsvReport, DomainError> {
        authorize_class(
            &self.classes,
            actor,
            class_id,
            "Not authorized to generate report for this class",
        )
        .await?;
        check_span(start, end, self.max_days)?;

        let students = self
            .students
            .find_limited(&Filter::all().eq("class_id", class_id), self.list_limit)
            .await?;
        let records = if start <= end {
            self.attendance
                .find(
                    &Filter::all()
                        .eq("class_id", class_id)
                        .between("date", start.to_string(), end.to_string()),
                )
                .await?
        } else {
            Vec::new()
        };

        let bytes = render_csv(&students, &records, start, end)
            .map_err(|e| DomainError::internal(format!("CSV rendering failed: {e}")))?;
        info!(students = students.len(), bytes = bytes.len(), "report generated");

        Ok(CsvReport {
            filename: format!("attendance_report_{class_id}_{start}_{end}.csv"),
            bytes,
        })
    }
}
