use axum::{
    routing::{get, post, put},
    Extension, Router,
};

use crate::api::rest::handlers;
use crate::module::Attendance;

pub fn register_routes(module: &Attendance) -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/users", get(handlers::list_users))
        .route(
            "/classes",
            get(handlers::list_classes).post(handlers::create_class),
        )
        .route(
            "/classes/{id}",
            put(handlers::update_class).delete(handlers::delete_class),
        )
        .route(
            "/students",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/students/{id}",
            put(handlers::update_student).delete(handlers::delete_student),
        )
        .route("/attendance/bulk", post(handlers::mark_bulk_attendance))
        .route("/attendance", get(handlers::get_attendance))
        .route(
            "/attendance/report/csv",
            get(handlers::download_attendance_csv),
        )
        .layer(Extension(module.auth.clone()))
        .layer(Extension(module.identity.clone()))
        .layer(Extension(module.registry.clone()))
        .layer(Extension(module.ledger.clone()))
        .layer(Extension(module.reports.clone()))
}
