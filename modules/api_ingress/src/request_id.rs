//! Request correlation. Every request carries an `x-request-id`: the client's
//! own when it sent one, otherwise a fresh nanoid. The id is echoed on the
//! response, stamped on the `http_request` span and handed to handlers as
//! [`XRequestId`] so problem bodies can quote it.

use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderValue, Request, Response},
    middleware::{from_fn, Next},
    Router,
};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::{field::Empty, Span};

pub use modkit::api::request_id::{header, XRequestId};

const GENERATED_LEN: usize = 16;

/// Issues ids for requests that arrive without one.
#[derive(Clone, Copy, Default)]
pub struct NanoId;

impl MakeRequestId for NanoId {
    fn make_request_id<B>(&mut self, _req: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&nanoid::nanoid!(GENERATED_LEN))
            .ok()
            .map(RequestId::new)
    }
}

fn request_id_of<B>(req: &Request<B>) -> Option<&str> {
    req.headers().get(header()).and_then(|v| v.to_str().ok())
}

fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = request_id_of(req).unwrap_or("-"),
        status = Empty,
        latency_ms = Empty,
    )
}

fn record_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status().as_u16();
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    span.record("status", status);
    span.record("latency_ms", latency_ms);
    tracing::debug!(status, latency_ms, "response sent");
}

async fn expose(mut req: Request<Body>, next: Next) -> axum::response::Response {
    if let Some(rid) = request_id_of(&req).map(str::to_owned) {
        req.extensions_mut().insert(XRequestId(rid));
    }
    next.run(req).await
}

/// Wrap `router` so the id is settled before anything inside it runs.
///
/// Outermost first: propagate to response, assign, expose to handlers, trace.
pub fn with_request_ids(router: Router) -> Router {
    let name = header();
    let trace = TraceLayer::new_for_http()
        .make_span_with(request_span)
        .on_response(record_response);
    router
        .layer(trace)
        .layer(from_fn(expose))
        .layer(SetRequestIdLayer::new(name.clone(), NanoId))
        .layer(PropagateRequestIdLayer::new(name))
}
