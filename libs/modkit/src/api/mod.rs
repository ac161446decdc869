pub mod context;
pub mod problem;
pub mod request_id;
