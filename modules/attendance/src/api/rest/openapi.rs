use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::api::rest::handlers;

#[derive(OpenApi)]
#[openapi(
    info(title = "Attendance API", description = "Classes, students and daily attendance"),
    servers((url = "/api")),
    paths(
        handlers::register,
        handlers::login,
        handlers::list_users,
        handlers::list_classes,
        handlers::create_class,
        handlers::update_class,
        handlers::delete_class,
        handlers::list_students,
        handlers::create_student,
        handlers::update_student,
        handlers::delete_student,
        handlers::mark_bulk_attendance,
        handlers::get_attendance,
        handlers::download_attendance_csv,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "User administration"),
        (name = "classes"),
        (name = "students"),
        (name = "attendance", description = "Daily attendance and reports"),
    )
)]
pub struct AttendanceApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
