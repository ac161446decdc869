use axum::http::StatusCode;
use modkit::{Problem, ProblemCtx, ProblemResponse};
use tracing::{error, warn};

use crate::domain::error::DomainError;

/// Map a domain error to an RFC 9457 response for the current request.
pub fn map_domain_error(e: &DomainError, ctx: &ProblemCtx) -> ProblemResponse {
    let problem = match e {
        DomainError::Validation { field, message } => Problem::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            format!("{field}: {message}"),
        )
        .with_field_error(field, message.clone()),
        DomainError::EmailAlreadyRegistered { .. } => Problem::new(
            StatusCode::BAD_REQUEST,
            "EMAIL_ALREADY_REGISTERED",
            "Email already registered",
        ),
        DomainError::InvalidCredentials => Problem::new(
            StatusCode::BAD_REQUEST,
            "INVALID_CREDENTIALS",
            "Invalid email or password",
        ),
        DomainError::NotAuthenticated => Problem::new(
            StatusCode::FORBIDDEN,
            "NOT_AUTHENTICATED",
            "Not authenticated",
        ),
        DomainError::Unauthorized { reason } => Problem::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            reason.clone(),
        ),
        DomainError::Forbidden { reason } => Problem::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            reason.clone(),
        ),
        DomainError::ClassNotFound { .. } => Problem::new(
            StatusCode::NOT_FOUND,
            "CLASS_NOT_FOUND",
            "Class not found",
        ),
        DomainError::StudentNotFound { .. } => Problem::new(
            StatusCode::NOT_FOUND,
            "STUDENT_NOT_FOUND",
            "Student not found",
        ),
        DomainError::Database { .. } | DomainError::Internal { .. } => {
            error!(error = %e, instance = %ctx.instance, "request failed");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "An internal error occurred",
            )
        }
    };
    if problem.status < 500 {
        warn!(status = problem.status, error = %e, instance = %ctx.instance, "request rejected");
    }
    ctx.finish(problem)
}

/// 400 for bodies and query strings that do not deserialize.
pub fn malformed(detail: impl Into<String>, ctx: &ProblemCtx) -> ProblemResponse {
    let detail = detail.into();
    warn!(instance = %ctx.instance, %detail, "malformed request");
    ctx.finish(Problem::new(
        StatusCode::BAD_REQUEST,
        "MALFORMED_REQUEST",
        detail,
    ))
}
