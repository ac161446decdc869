pub mod auth;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod policy;
pub mod ports;
pub mod registry;
pub mod report;
pub mod store;
