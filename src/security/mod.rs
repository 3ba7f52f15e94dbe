//! Security
//!
//! Gatekeeping for everything that reaches the database: the read-only SQL
//! allow-list and inbound request validation.

pub mod request;
pub mod sql_guard;

pub use request::*;
pub use sql_guard::*;
