use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::contract::model::{
    AttendanceEntry, AttendanceMark, AttendanceStatus, AuthSession, Class, ClassInput, DayStatus,
    NewUser, Role, Student, StudentInput, User,
};

/// REST DTO for a user; the password hash never leaves the service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterReq {
    pub username: String,
    pub email: String,
    pub password: String,
    /// `admin` or `teacher`.
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponseDto {
    pub message: String,
    pub token: String,
    pub user: UserDto,
}

impl AuthResponseDto {
    pub fn new(message: &str, session: AuthSession) -> Self {
        Self {
            message: message.to_string(),
            token: session.token,
            user: session.user.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageDto {
    pub message: String,
}

impl MessageDto {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassDto {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub teacher_id: String,
    pub created_at: DateTime<Utc>,
}

/// Body for both create and full update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassReq {
    pub name: String,
    pub subject: String,
    pub teacher_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub class_id: String,
    pub roll_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentReq {
    pub name: String,
    pub email: String,
    pub class_id: String,
    pub roll_number: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListStudentsQuery {
    /// Only students of this class.
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceMarkDto {
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkAttendanceReq {
    pub class_id: String,
    pub date: NaiveDate,
    pub attendance_records: Vec<AttendanceMarkDto>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub class_id: String,
    /// Day as `YYYY-MM-DD`.
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceEntryDto {
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub status: DayStatus,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    pub class_id: String,
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
}

// Conversion implementations between REST DTOs and contract models

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

impl From<RegisterReq> for NewUser {
    fn from(req: RegisterReq) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
            role: req.role,
        }
    }
}

impl From<Class> for ClassDto {
    fn from(class: Class) -> Self {
        Self {
            id: class.id,
            name: class.name,
            subject: class.subject,
            teacher_id: class.teacher_id,
            created_at: class.created_at,
        }
    }
}

impl From<ClassReq> for ClassInput {
    fn from(req: ClassReq) -> Self {
        Self {
            name: req.name,
            subject: req.subject,
            teacher_id: req.teacher_id,
        }
    }
}

impl From<Student> for StudentDto {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            email: student.email,
            class_id: student.class_id,
            roll_number: student.roll_number,
            created_at: student.created_at,
        }
    }
}

impl From<StudentReq> for StudentInput {
    fn from(req: StudentReq) -> Self {
        Self {
            name: req.name,
            email: req.email,
            class_id: req.class_id,
            roll_number: req.roll_number,
        }
    }
}

impl From<AttendanceMarkDto> for AttendanceMark {
    fn from(dto: AttendanceMarkDto) -> Self {
        Self {
            student_id: dto.student_id,
            status: dto.status,
        }
    }
}

impl From<AttendanceEntry> for AttendanceEntryDto {
    fn from(entry: AttendanceEntry) -> Self {
        Self {
            student_id: entry.student_id,
            student_name: entry.student_name,
            roll_number: entry.roll_number,
            status: entry.status,
        }
    }
}
