//! Attendance module: users, classes, students, daily attendance and CSV reports.
//!
//! Layout:
//! - `contract`: document types shared across layers
//! - `domain`: services, ownership policy and the storage port
//! - `infra`: document store backends and credential primitives
//! - `api::rest`: axum handlers, DTOs and the OpenAPI document

pub mod api;
pub mod config;
pub mod contract;
pub mod domain;
pub mod infra;
mod module;

pub use config::AttendanceConfig;
pub use module::Attendance;
