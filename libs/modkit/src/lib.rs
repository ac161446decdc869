//! # ModKit
//!
//! Shared web plumbing for the server's modules:
//!
//! - [`api::problem`]: RFC 9457 Problem Details responses
//! - [`api::context`]: per-request context used when rendering problems
//! - [`runtime::shutdown`]: process signal handling for graceful shutdown

pub use anyhow::Result;

pub mod api;
pub mod runtime;

pub use api::context::ProblemCtx;
pub use api::problem::{Problem, ProblemResponse, ValidationError, APPLICATION_PROBLEM_JSON};
pub use api::request_id::XRequestId;
