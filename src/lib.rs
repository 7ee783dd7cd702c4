//! Capability-preserving response interception.
//!
//! Middleware often needs to observe or alter what a handler writes: count
//! bytes, capture the status, digest the body. Wrapping the response sink
//! must not hide what the sink can do, because handlers probe for optional
//! capabilities (flush, hijack, push, bulk transfer, close notification)
//! and change behavior based on the answer.
//!
//! [`wrap()`] returns a sink that routes every operation through a set of
//! [`Hooks`] and advertises exactly the capabilities of the sink it wraps.

// Core
pub mod hooks;
pub mod sink;
pub mod wrap;

// Host
pub mod config;
pub mod http;
pub mod observability;

pub use hooks::{BodyDigest, Hooks, Passthrough, ResponseMetrics};
pub use http::HttpServer;
pub use sink::{BodySource, Capabilities, Capability, Headers, Opaque, ResponseSink};
pub use wrap::{unwrap, wrap, wrap_with_pool, BufferPool, WrappedSink};
