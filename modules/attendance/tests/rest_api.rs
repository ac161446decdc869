//! HTTP-level tests: the attendance router mounted behind the ingress stack.

mod common;

use api_ingress::{ApiIngress, ApiIngressConfig};
use attendance::Attendance;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing_test::traced_test;

fn app(module: &Attendance) -> Router {
    ApiIngress::new(ApiIngressConfig::default())
        .build_router(module.router(), Some(Attendance::openapi()))
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, req).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, name: &str, role: &str) -> (String, String) {
    let (status, body) = send_json(
        app,
        request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": name,
                "email": format!("{name}@school.test"),
                "password": "secret",
                "role": role,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn register_then_login_over_http() {
    let module = common::module();
    let app = app(&module);

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "ada",
                "email": "ada@school.test",
                "password": "secret",
                "role": "teacher",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["role"], "teacher");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ada@school.test", "password": "secret"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ada@school.test", "password": "wrong"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid email or password");
}

#[tokio::test]
async fn duplicate_email_is_a_bad_request() {
    let module = common::module();
    let app = app(&module);
    register(&app, "ada", "teacher").await;

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "other",
                "email": "ada@school.test",
                "password": "x",
                "role": "admin",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");
    assert_eq!(body["code"], "EMAIL_ALREADY_REGISTERED");
}

#[tokio::test]
async fn missing_credentials_are_forbidden() {
    let module = common::module();
    let app = app(&module);

    let (status, _, bytes) = send(&app, request(Method::GET, "/api/classes", None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], 403);
    assert_eq!(body["instance"], "/api/classes");
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let module = common::module();
    let app = app(&module);

    let (status, body) = send_json(
        &app,
        request(Method::GET, "/api/classes", Some("not-a-jwt"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token");
}

#[tokio::test]
async fn problem_responses_use_problem_json() {
    let module = common::module();
    let app = app(&module);

    let (status, headers, _) = send(&app, request(Method::GET, "/api/users", None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn users_list_requires_admin() {
    let module = common::module();
    let app = app(&module);
    let (teacher, _) = register(&app, "tess", "teacher").await;
    let (admin, _) = register(&app, "root", "admin").await;

    let (status, body) =
        send_json(&app, request(Method::GET, "/api/users", Some(teacher.as_str()), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Admin access required");

    let (status, body) =
        send_json(&app, request(Method::GET, "/api/users", Some(admin.as_str()), None)).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let module = common::module();
    let app = app(&module);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MALFORMED_REQUEST");
}

#[tokio::test]
async fn unknown_attendance_status_is_rejected() {
    let module = common::module();
    let app = app(&module);
    let (token, teacher_id) = register(&app, "tess", "teacher").await;

    let (_, class) = send_json(
        &app,
        request(
            Method::POST,
            "/api/classes",
            Some(token.as_str()),
            Some(json!({"name": "7B", "subject": "Math", "teacher_id": teacher_id})),
        ),
    )
    .await;

    let (status, _) = send_json(
        &app,
        request(
            Method::POST,
            "/api/attendance/bulk",
            Some(token.as_str()),
            Some(json!({
                "class_id": class["id"],
                "date": "2024-03-01",
                "attendance_records": [{"student_id": "s1", "status": "sleeping"}],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_query_date_is_rejected() {
    let module = common::module();
    let app = app(&module);
    let (token, _) = register(&app, "tess", "teacher").await;

    let (status, body) = send_json(
        &app,
        request(
            Method::GET,
            "/api/attendance?class_id=c1&date=yesterday",
            Some(token.as_str()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MALFORMED_REQUEST");
}

#[tokio::test]
async fn unknown_class_is_not_found() {
    let module = common::module();
    let app = app(&module);
    let (token, _) = register(&app, "tess", "teacher").await;

    let (status, body) = send_json(
        &app,
        request(
            Method::PUT,
            "/api/classes/missing",
            Some(token.as_str()),
            Some(json!({"name": "x", "subject": "y", "teacher_id": "z"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Class not found");
}

#[tokio::test]
async fn classroom_day_over_http() {
    let module = common::module();
    let app = app(&module);
    let (token, teacher_id) = register(&app, "tess", "teacher").await;

    let (status, class) = send_json(
        &app,
        request(
            Method::POST,
            "/api/classes",
            Some(token.as_str()),
            Some(json!({"name": "7B", "subject": "Math", "teacher_id": teacher_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let class_id = class["id"].as_str().unwrap().to_string();

    let mut student_ids = Vec::new();
    for (name, roll) in [("Ann", "1"), ("Bob", "2")] {
        let (status, student) = send_json(
            &app,
            request(
                Method::POST,
                "/api/students",
                Some(token.as_str()),
                Some(json!({
                    "name": name,
                    "email": format!("{name}@pupils.test"),
                    "class_id": class_id,
                    "roll_number": roll,
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        student_ids.push(student["id"].as_str().unwrap().to_string());
    }

    let (status, body) = send_json(
        &app,
        request(
            Method::POST,
            "/api/attendance/bulk",
            Some(token.as_str()),
            Some(json!({
                "class_id": class_id,
                "date": "2024-03-01",
                "attendance_records": [{"student_id": student_ids[0], "status": "present"}],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Attendance marked for 1 students");

    let (status, body) = send_json(
        &app,
        request(
            Method::GET,
            &format!("/api/attendance?class_id={class_id}&date=2024-03-01"),
            Some(token.as_str()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let status_of = |id: &str| {
        entries
            .iter()
            .find(|e| e["student_id"] == id)
            .map(|e| e["status"].clone())
            .unwrap()
    };
    assert_eq!(status_of(&student_ids[0]), "present");
    assert_eq!(status_of(&student_ids[1]), "not_marked");

    let (status, headers, bytes) = send(
        &app,
        request(
            Method::GET,
            &format!(
                "/api/attendance/report/csv?class_id={class_id}&start_date=2024-03-01&end_date=2024-03-02"
            ),
            Some(token.as_str()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/csv");
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap(),
        format!("attachment; filename=attendance_report_{class_id}_2024-03-01_2024-03-02.csv")
    );
    let csv = String::from_utf8(bytes).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("Student Name,Roll Number,2024-03-01,2024-03-02")
    );
    assert_eq!(lines.count(), 2);

    let (status, body) = send_json(
        &app,
        request(
            Method::DELETE,
            &format!("/api/classes/{class_id}"),
            Some(token.as_str()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Class deleted successfully");
}

#[traced_test]
#[tokio::test]
async fn class_handlers_trace_requests() {
    let module = common::module();
    let app = app(&module);
    let (token, teacher_id) = register(&app, "tess", "teacher").await;

    tracing::info!("creating class through the router");
    let (status, _) = send_json(
        &app,
        request(
            Method::POST,
            "/api/classes",
            Some(token.as_str()),
            Some(json!({"name": "8A", "subject": "Art", "teacher_id": teacher_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        send_json(&app, request(Method::GET, "/api/classes", Some(token.as_str()), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert!(logs_contain("creating class through the router"));
}

async fn create_class(app: &Router, token: &str, teacher_id: &str, name: &str) -> String {
    let (status, class) = send_json(
        app,
        request(
            Method::POST,
            "/api/classes",
            Some(token),
            Some(json!({"name": name, "subject": "Math", "teacher_id": teacher_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{class}");
    class["id"].as_str().unwrap().to_string()
}

async fn create_student(app: &Router, token: &str, class_id: &str, name: &str) {
    let (status, body) = send_json(
        app,
        request(
            Method::POST,
            "/api/students",
            Some(token),
            Some(json!({
                "name": name,
                "email": format!("{name}@pupils.test"),
                "class_id": class_id,
                "roll_number": "1",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn empty_class_filter_lists_every_student() {
    let module = common::module();
    let app = app(&module);
    let (token, admin_id) = register(&app, "root", "admin").await;
    let first = create_class(&app, &token, &admin_id, "7A").await;
    let second = create_class(&app, &token, &admin_id, "7B").await;
    create_student(&app, &token, &first, "Ann").await;
    create_student(&app, &token, &second, "Bob").await;

    let (status, body) = send_json(
        &app,
        request(Method::GET, "/api/students?class_id=", Some(token.as_str()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = send_json(
        &app,
        request(
            Method::GET,
            &format!("/api/students?class_id={first}"),
            Some(token.as_str()),
            None,
        ),
    )
    .await;
    let names: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Ann"]);
}

#[tokio::test]
async fn report_range_is_capped() {
    let module = common::module();
    let app = app(&module);
    let (token, teacher_id) = register(&app, "tess", "teacher").await;
    let class_id = create_class(&app, &token, &teacher_id, "7B").await;
    create_student(&app, &token, &class_id, "Ann").await;

    let (status, body) = send_json(
        &app,
        request(
            Method::GET,
            &format!(
                "/api/attendance/report/csv?class_id={class_id}&start_date=0001-01-01&end_date=9999-12-31"
            ),
            Some(token.as_str()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");
    assert_eq!(body["errors"][0]["pointer"], "/end_date");

    // Exactly at the cap still renders.
    let (status, _, bytes) = send(
        &app,
        request(
            Method::GET,
            &format!(
                "/api/attendance/report/csv?class_id={class_id}&start_date=2024-01-01&end_date=2024-01-{}",
                common::REPORT_MAX_DAYS
            ),
            Some(token.as_str()),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let header = String::from_utf8(bytes).unwrap();
    let width = header.lines().next().unwrap().split(',').count();
    assert_eq!(width, 2 + common::REPORT_MAX_DAYS as usize);
}

#[tokio::test]
async fn generated_request_id_is_echoed() {
    let module = common::module();
    let app = app(&module);

    let (status, headers, bytes) =
        send(&app, request(Method::GET, "/api/classes", Some("bogus"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let rid = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(!rid.is_empty());

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["request_id"], rid.as_str());
    assert_eq!(body["instance"], "/api/classes");
}

#[tokio::test]
async fn client_request_id_reaches_problem_body() {
    let module = common::module();
    let app = app(&module);
    let (token, _) = register(&app, "tess", "teacher").await;

    let mut req = request(
        Method::DELETE,
        "/api/students/ghost",
        Some(token.as_str()),
        None,
    );
    req.headers_mut()
        .insert("x-request-id", "roll-call-42".parse().unwrap());
    let (status, headers, bytes) = send(&app, req).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get("x-request-id").unwrap(), "roll-call-42");
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["request_id"], "roll-call-42");
    assert_eq!(body["instance"], "/api/students/ghost");
    assert_eq!(body["code"], "STUDENT_NOT_FOUND");
}
