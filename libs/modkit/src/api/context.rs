use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};
use std::convert::Infallible;

use crate::api::problem::{Problem, ProblemResponse};
use crate::api::request_id::{header, XRequestId};

/// Request facts a handler needs to render a Problem: the `instance` path and the
/// request id assigned by the ingress layer (or sent by the client).
#[derive(Debug, Clone, Default)]
pub struct ProblemCtx {
    pub instance: String,
    pub request_id: Option<String>,
}

impl ProblemCtx {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            request_id: None,
        }
    }

    /// Stamp instance and request id onto a problem.
    pub fn finish(&self, problem: Problem) -> ProblemResponse {
        let mut problem = problem;
        problem.instance = self.instance.clone();
        if let Some(id) = &self.request_id {
            problem.request_id = Some(id.clone());
        }
        problem.into()
    }

    pub fn from_parts(parts: &Parts) -> Self {
        let request_id = parts
            .extensions
            .get::<XRequestId>()
            .map(|rid| rid.0.clone())
            .or_else(|| {
                parts
                    .headers
                    .get(header())
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            });
        // Nested routers see a stripped uri; report the path the client used.
        let instance = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path(), |uri| uri.0.path())
            .to_string();
        Self {
            instance,
            request_id,
        }
    }
}

impl<S> FromRequestParts<S> for ProblemCtx
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
