//! Capability-preserving sink wrapper.
//!
//! # Data Flow
//! ```text
//! wrap(sink, hooks)
//!     → probe the five optional capabilities once
//!     → WrappedSink caches each detected capability and the 5-bit mask
//!
//! handler → WrappedSink::write / flush / push / ...
//!     → status commit (first call only, atomic)
//!     → Hooks::hook_* with the real sink or capability
//! ```
//!
//! # Design Decisions
//! - A wrapper advertises exactly the capabilities of the sink it wraps,
//!   so capability checks behave the same with or without wrapping
//! - The mandatory protocol is always intercepted, even when the sink has
//!   no optional capability at all
//! - Wrappers borrow the sink, the hooks and the buffer pool; nesting is
//!   plain borrowing and `unwrap` peels one layer per call

mod transfer;

pub mod pool;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use tokio::sync::watch;

use crate::hooks::Hooks;
use crate::sink::{
    BodySource, Capabilities, CloseNotifier, Flusher, Headers, Hijacked, Hijacker, PushOptions,
    Pusher, ReaderFrom, ResponseSink,
};

pub use pool::{BufferPool, PooledBuffer};

/// Wrap `sink` so every operation goes through `hooks`.
///
/// Bulk transfers that fall back to a copy loop borrow buffers from
/// [`BufferPool::global`].
pub fn wrap<'a>(sink: &'a dyn ResponseSink, hooks: &'a dyn Hooks) -> WrappedSink<'a> {
    wrap_with_pool(sink, hooks, BufferPool::global())
}

/// Like [`wrap`], with an explicit buffer pool.
pub fn wrap_with_pool<'a>(
    sink: &'a dyn ResponseSink,
    hooks: &'a dyn Hooks,
    pool: &'a BufferPool,
) -> WrappedSink<'a> {
    let wrapped = WrappedSink {
        inner: sink,
        hooks,
        pool,
        capabilities: Capabilities::of(sink),
        flusher: sink.as_flusher(),
        hijacker: sink.as_hijacker(),
        pusher: sink.as_pusher(),
        reader_from: sink.as_reader_from(),
        close_notifier: sink.as_close_notifier(),
        wrote_header: AtomicBool::new(false),
    };
    tracing::trace!(capabilities = ?wrapped.capabilities, "Wrapped response sink");
    wrapped
}

/// The sink `sink` wraps, or `None` if it is not a wrapper.
pub fn unwrap(sink: &dyn ResponseSink) -> Option<&dyn ResponseSink> {
    sink.inner_sink()
}

/// A sink that forwards every call through a set of hooks.
///
/// The capability traits are implemented unconditionally on this type, but
/// `as_flusher()` and friends only return `Some` for capabilities the
/// wrapped sink has. Calling a missing capability directly on the concrete
/// type returns `ErrorKind::Unsupported`.
pub struct WrappedSink<'a> {
    inner: &'a dyn ResponseSink,
    hooks: &'a dyn Hooks,
    pool: &'a BufferPool,
    capabilities: Capabilities,
    flusher: Option<&'a dyn Flusher>,
    hijacker: Option<&'a dyn Hijacker>,
    pusher: Option<&'a dyn Pusher>,
    reader_from: Option<&'a dyn ReaderFrom>,
    close_notifier: Option<&'a dyn CloseNotifier>,
    wrote_header: AtomicBool,
}

impl<'a> WrappedSink<'a> {
    /// Capabilities detected when the wrapper was built.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The wrapped sink.
    pub fn inner(&self) -> &'a dyn ResponseSink {
        self.inner
    }

    /// Whether a status has been committed through this wrapper.
    pub fn status_committed(&self) -> bool {
        self.wrote_header.load(Ordering::Acquire)
    }

    pub(crate) fn hooks(&self) -> &'a dyn Hooks {
        self.hooks
    }

    pub(crate) fn pool(&self) -> &'a BufferPool {
        self.pool
    }

    pub(crate) fn native_reader_from(&self) -> Option<&'a dyn ReaderFrom> {
        self.reader_from
    }
}

impl std::fmt::Debug for WrappedSink<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedSink")
            .field("capabilities", &self.capabilities)
            .field("status_committed", &self.status_committed())
            .finish_non_exhaustive()
    }
}

impl ResponseSink for WrappedSink<'_> {
    fn headers(&self) -> Headers {
        self.hooks.hook_headers(self.inner)
    }

    fn write_header(&self, status: StatusCode) {
        if self
            .wrote_header
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.hooks.hook_write_header(self.inner, status);
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_header(StatusCode::OK);
        self.hooks.hook_write(self.inner, buf)
    }

    fn as_flusher(&self) -> Option<&dyn Flusher> {
        self.flusher.map(|_| self as &dyn Flusher)
    }

    fn as_hijacker(&self) -> Option<&dyn Hijacker> {
        self.hijacker.map(|_| self as &dyn Hijacker)
    }

    fn as_pusher(&self) -> Option<&dyn Pusher> {
        self.pusher.map(|_| self as &dyn Pusher)
    }

    fn as_reader_from(&self) -> Option<&dyn ReaderFrom> {
        self.reader_from.map(|_| self as &dyn ReaderFrom)
    }

    fn as_close_notifier(&self) -> Option<&dyn CloseNotifier> {
        self.close_notifier.map(|_| self as &dyn CloseNotifier)
    }

    fn inner_sink(&self) -> Option<&dyn ResponseSink> {
        Some(self.inner)
    }
}

fn unsupported(capability: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("wrapped sink does not support {}", capability),
    )
}

impl Flusher for WrappedSink<'_> {
    fn flush(&self) -> io::Result<()> {
        let flusher = self.flusher.ok_or_else(|| unsupported("flush"))?;
        self.write_header(StatusCode::OK);
        self.hooks.hook_flush(flusher)
    }
}

impl Hijacker for WrappedSink<'_> {
    fn hijack(&self) -> io::Result<Hijacked> {
        let hijacker = self.hijacker.ok_or_else(|| unsupported("hijack"))?;
        self.hooks.hook_hijack(hijacker)
    }
}

impl Pusher for WrappedSink<'_> {
    fn push(&self, target: &str, opts: Option<&PushOptions>) -> io::Result<()> {
        let pusher = self.pusher.ok_or_else(|| unsupported("push"))?;
        self.hooks.hook_push(pusher, target, opts)
    }
}

impl ReaderFrom for WrappedSink<'_> {
    fn read_from(&self, src: &mut dyn BodySource) -> io::Result<u64> {
        transfer::read_from(self, src)
    }
}

impl CloseNotifier for WrappedSink<'_> {
    fn close_notify(&self) -> watch::Receiver<bool> {
        match self.close_notifier {
            Some(notifier) => notifier.close_notify(),
            None => watch::channel(false).1,
        }
    }
}
