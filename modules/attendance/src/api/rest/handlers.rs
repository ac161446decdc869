use std::sync::Arc;

use axum::{
    extract::Path,
    http::header,
    response::{IntoResponse, Json},
    Extension,
};
use modkit::{Problem, ProblemCtx, ProblemResponse};
use tracing::info;

use crate::api::rest::dto::{
    AttendanceEntryDto, AttendanceQuery, AuthResponseDto, BulkAttendanceReq, ClassDto, ClassReq,
    ListStudentsQuery, LoginReq, MessageDto, RegisterReq, ReportQuery, StudentDto, StudentReq,
    UserDto,
};
use crate::api::rest::error::map_domain_error;
use crate::api::rest::extract::{Actor, JsonBody, QueryParams};
use crate::contract::model::AttendanceMark;
use crate::domain::auth::AuthService;
use crate::domain::ledger::LedgerService;
use crate::domain::registry::RegistryService;
use crate::domain::report::ReportService;

type ApiResult<T> = Result<T, ProblemResponse>;

/// Register a new admin or teacher and return a bearer token
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterReq,
    responses(
        (status = 200, description = "User registered", body = AuthResponseDto),
        (status = 400, description = "Invalid payload or email already registered", body = Problem),
    )
)]
pub async fn register(
    Extension(svc): Extension<Arc<AuthService>>,
    ctx: ProblemCtx,
    JsonBody(req): JsonBody<RegisterReq>,
) -> ApiResult<Json<AuthResponseDto>> {
    info!(email = %req.email, "Registering user");
    let session = svc
        .register(req.into())
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(AuthResponseDto::new(
        "User registered successfully",
        session,
    )))
}

/// Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Login successful", body = AuthResponseDto),
        (status = 400, description = "Invalid email or password", body = Problem),
    )
)]
pub async fn login(
    Extension(svc): Extension<Arc<AuthService>>,
    ctx: ProblemCtx,
    JsonBody(req): JsonBody<LoginReq>,
) -> ApiResult<Json<AuthResponseDto>> {
    info!(email = %req.email, "Login attempt");
    let session = svc
        .login(&req.email, &req.password)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(AuthResponseDto::new("Login successful", session)))
}

/// List all users (admin only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All users", body = [UserDto]),
        (status = 401, body = Problem),
        (status = 403, body = Problem),
    )
)]
pub async fn list_users(
    Extension(svc): Extension<Arc<AuthService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<UserDto>>> {
    let users = svc
        .list_users(&actor)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

/// List classes visible to the caller
#[utoipa::path(
    get,
    path = "/classes",
    tag = "classes",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All classes for admins, own classes for teachers", body = [ClassDto]),
        (status = 401, body = Problem),
        (status = 403, body = Problem),
    )
)]
pub async fn list_classes(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<ClassDto>>> {
    let classes = svc
        .list_classes(&actor)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(classes.into_iter().map(ClassDto::from).collect()))
}

/// Create a class
#[utoipa::path(
    post,
    path = "/classes",
    tag = "classes",
    security(("bearer" = [])),
    request_body = ClassReq,
    responses(
        (status = 200, description = "Created class", body = ClassDto),
        (status = 400, body = Problem),
        (status = 403, body = Problem),
    )
)]
pub async fn create_class(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    JsonBody(req): JsonBody<ClassReq>,
) -> ApiResult<Json<ClassDto>> {
    info!(name = %req.name, teacher_id = %req.teacher_id, "Creating class");
    let class = svc
        .create_class(&actor, req.into())
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(class.into()))
}

/// Replace a class's fields
#[utoipa::path(
    put,
    path = "/classes/{id}",
    tag = "classes",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Class id")),
    request_body = ClassReq,
    responses(
        (status = 200, description = "Updated class", body = ClassDto),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    )
)]
pub async fn update_class(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ClassReq>,
) -> ApiResult<Json<ClassDto>> {
    info!(class_id = %id, "Updating class");
    let class = svc
        .update_class(&actor, &id, req.into())
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(class.into()))
}

/// Delete a class
#[utoipa::path(
    delete,
    path = "/classes/{id}",
    tag = "classes",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Class id")),
    responses(
        (status = 200, description = "Class deleted", body = MessageDto),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    )
)]
pub async fn delete_class(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageDto>> {
    info!(class_id = %id, "Deleting class");
    svc.delete_class(&actor, &id)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(MessageDto::new("Class deleted successfully")))
}

/// List students, optionally of one class
#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    security(("bearer" = [])),
    params(ListStudentsQuery),
    responses(
        (status = 200, description = "Students", body = [StudentDto]),
        (status = 401, body = Problem),
        (status = 403, body = Problem),
    )
)]
pub async fn list_students(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    QueryParams(query): QueryParams<ListStudentsQuery>,
) -> ApiResult<Json<Vec<StudentDto>>> {
    let students = svc
        .list_students(&actor, query.class_id.as_deref())
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(students.into_iter().map(StudentDto::from).collect()))
}

/// Add a student to a class
#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    security(("bearer" = [])),
    request_body = StudentReq,
    responses(
        (status = 200, description = "Created student", body = StudentDto),
        (status = 403, body = Problem),
        (status = 404, description = "Class not found", body = Problem),
    )
)]
pub async fn create_student(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    JsonBody(req): JsonBody<StudentReq>,
) -> ApiResult<Json<StudentDto>> {
    info!(class_id = %req.class_id, "Creating student");
    let student = svc
        .create_student(&actor, req.into())
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(student.into()))
}

/// Replace a student's fields
#[utoipa::path(
    put,
    path = "/students/{id}",
    tag = "students",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Student id")),
    request_body = StudentReq,
    responses(
        (status = 200, description = "Updated student", body = StudentDto),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    )
)]
pub async fn update_student(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<StudentReq>,
) -> ApiResult<Json<StudentDto>> {
    info!(student_id = %id, "Updating student");
    let student = svc
        .update_student(&actor, &id, req.into())
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(student.into()))
}

/// Delete a student
#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student deleted", body = MessageDto),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    )
)]
pub async fn delete_student(
    Extension(svc): Extension<Arc<RegistryService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageDto>> {
    info!(student_id = %id, "Deleting student");
    svc.delete_student(&actor, &id)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(MessageDto::new("Student deleted successfully")))
}

/// Replace a class's attendance for one day
#[utoipa::path(
    post,
    path = "/attendance/bulk",
    tag = "attendance",
    security(("bearer" = [])),
    request_body = BulkAttendanceReq,
    responses(
        (status = 200, description = "Attendance recorded", body = MessageDto),
        (status = 400, body = Problem),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    )
)]
pub async fn mark_bulk_attendance(
    Extension(svc): Extension<Arc<LedgerService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    JsonBody(req): JsonBody<BulkAttendanceReq>,
) -> ApiResult<Json<MessageDto>> {
    info!(class_id = %req.class_id, date = %req.date, "Marking attendance");
    let marks = req
        .attendance_records
        .into_iter()
        .map(AttendanceMark::from)
        .collect();
    let written = svc
        .bulk_mark(&actor, &req.class_id, req.date, marks)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(MessageDto::new(format!(
        "Attendance marked for {written} students"
    ))))
}

/// Attendance of every student of a class on one day
#[utoipa::path(
    get,
    path = "/attendance",
    tag = "attendance",
    security(("bearer" = [])),
    params(AttendanceQuery),
    responses(
        (status = 200, description = "One entry per student", body = [AttendanceEntryDto]),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    )
)]
pub async fn get_attendance(
    Extension(svc): Extension<Arc<LedgerService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    QueryParams(query): QueryParams<AttendanceQuery>,
) -> ApiResult<Json<Vec<AttendanceEntryDto>>> {
    let entries = svc
        .get_attendance(&actor, &query.class_id, query.date)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    Ok(Json(
        entries.into_iter().map(AttendanceEntryDto::from).collect(),
    ))
}

/// Student x day attendance matrix as a CSV attachment
#[utoipa::path(
    get,
    path = "/attendance/report/csv",
    tag = "attendance",
    security(("bearer" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "CSV report", content_type = "text/csv", body = String),
        (status = 403, body = Problem),
        (status = 404, body = Problem),
    )
)]
pub async fn download_attendance_csv(
    Extension(svc): Extension<Arc<ReportService>>,
    ctx: ProblemCtx,
    Actor(actor): Actor,
    QueryParams(query): QueryParams<ReportQuery>,
) -> ApiResult<impl IntoResponse> {
    let report = svc
        .generate_csv(&actor, &query.class_id, query.start_date, query.end_date)
        .await
        .map_err(|e| map_domain_error(&e, &ctx))?;
    let disposition = format!("attachment; filename={}", report.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.bytes,
    ))
}
