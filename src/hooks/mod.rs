//! Interception hooks.
//!
//! # Data Flow
//! ```text
//! WrappedSink operation
//!     → Hooks::hook_* (observe / transform)
//!     → real sink or capability (the hook decides whether to call through)
//! ```
//!
//! # Design Decisions
//! - Every hook has a passthrough default body, so an implementation only
//!   overrides the operations it cares about
//! - Hooks receive the real sink or capability, never the wrapper
//! - Hooks take `&self`; stateful hooks use atomics or locks

pub mod digest;
pub mod metrics;

use std::io;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::sink::{Flusher, Headers, Hijacked, Hijacker, PushOptions, Pusher, ResponseSink};

pub use digest::BodyDigest;
pub use metrics::ResponseMetrics;

/// Hooks into the operations of a wrapped sink.
pub trait Hooks: Send + Sync {
    /// Called whenever the header map is requested.
    fn hook_headers(&self, sink: &dyn ResponseSink) -> Headers {
        sink.headers()
    }

    /// Called for every body write, except bytes moved by the bulk-transfer
    /// fast path (a file source handed to a sink with native `ReaderFrom`).
    ///
    /// Wrap the file in [`Opaque`](crate::sink::Opaque) to see those bytes too.
    fn hook_write(&self, sink: &dyn ResponseSink, buf: &[u8]) -> io::Result<usize> {
        sink.write(buf)
    }

    /// Called once, when the status is first committed.
    fn hook_write_header(&self, sink: &dyn ResponseSink, status: StatusCode) {
        sink.write_header(status)
    }

    fn hook_flush(&self, flusher: &dyn Flusher) -> io::Result<()> {
        flusher.flush()
    }

    fn hook_hijack(&self, hijacker: &dyn Hijacker) -> io::Result<Hijacked> {
        hijacker.hijack()
    }

    fn hook_push(
        &self,
        pusher: &dyn Pusher,
        target: &str,
        opts: Option<&PushOptions>,
    ) -> io::Result<()> {
        pusher.push(target, opts)
    }
}

/// Hooks that pass every call straight through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Hooks for Passthrough {}

impl<H: Hooks + ?Sized> Hooks for Arc<H> {
    fn hook_headers(&self, sink: &dyn ResponseSink) -> Headers {
        (**self).hook_headers(sink)
    }

    fn hook_write(&self, sink: &dyn ResponseSink, buf: &[u8]) -> io::Result<usize> {
        (**self).hook_write(sink, buf)
    }

    fn hook_write_header(&self, sink: &dyn ResponseSink, status: StatusCode) {
        (**self).hook_write_header(sink, status)
    }

    fn hook_flush(&self, flusher: &dyn Flusher) -> io::Result<()> {
        (**self).hook_flush(flusher)
    }

    fn hook_hijack(&self, hijacker: &dyn Hijacker) -> io::Result<Hijacked> {
        (**self).hook_hijack(hijacker)
    }

    fn hook_push(
        &self,
        pusher: &dyn Pusher,
        target: &str,
        opts: Option<&PushOptions>,
    ) -> io::Result<()> {
        (**self).hook_push(pusher, target, opts)
    }
}
