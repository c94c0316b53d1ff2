//! API middleware.

pub mod auth;
pub mod security_headers;
pub mod tracing;
