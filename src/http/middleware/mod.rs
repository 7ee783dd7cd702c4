//! Handler middleware.
//!
//! Middleware here is a [`Handler`](crate::http::handler::Handler) that
//! wraps the sink it was given and delegates to the next handler.

pub mod access_log;

pub use access_log::AccessLog;
