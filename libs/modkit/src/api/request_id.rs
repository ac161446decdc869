use axum::http::HeaderName;

/// Request id stored in request extensions by the ingress middleware.
#[derive(Clone, Debug)]
pub struct XRequestId(pub String);

pub fn header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}
