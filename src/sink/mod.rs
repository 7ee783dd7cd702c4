//! Response sink protocol.
//!
//! # Data Flow
//! ```text
//! handler
//!     → ResponseSink (headers / write_header / write)
//!     → optional capabilities, discovered with as_flusher(), as_hijacker(), ...
//!     → host transport (recorder, streaming body, ...)
//! ```
//!
//! # Design Decisions
//! - Every operation takes `&self`; sinks synchronise internally so a single
//!   response may be driven from more than one thread
//! - Optional capabilities are probed through `as_*` accessors that default
//!   to `None`, so a sink only advertises what it actually implements
//! - `inner_sink` is the unwrap relation; plain sinks return `None`

pub mod capability;
pub mod source;

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::{HeaderMap, StatusCode};

pub use capability::{
    Capabilities, Capability, CloseNotifier, Connection, Flusher, Hijacked, Hijacker,
    PushOptions, Pusher, ReaderFrom,
};
pub use source::{BodySource, Opaque};

/// Shared handle to a response header map.
///
/// Cloning the handle shares the map, so headers set through any clone are
/// visible to the sink when it commits the response head.
#[derive(Debug, Clone, Default)]
pub struct Headers(Arc<Mutex<HeaderMap>>);

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing header map.
    pub fn from_map(map: HeaderMap) -> Self {
        Self(Arc::new(Mutex::new(map)))
    }

    /// Lock the map for reading or mutation.
    pub fn lock(&self) -> MutexGuard<'_, HeaderMap> {
        self.0.lock().expect("header map mutex poisoned")
    }

    /// Copy of the current headers.
    pub fn snapshot(&self) -> HeaderMap {
        self.lock().clone()
    }

    /// Whether both handles refer to the same map.
    pub fn ptr_eq(&self, other: &Headers) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The mandatory protocol of an HTTP response sink.
pub trait ResponseSink: Send + Sync {
    /// Header map that will be sent with the response head.
    fn headers(&self) -> Headers;

    /// Commit the response status. Sinks honour the first call only.
    fn write_header(&self, status: StatusCode);

    /// Write body bytes, committing `200 OK` first if no status was set.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    fn as_flusher(&self) -> Option<&dyn Flusher> {
        None
    }

    fn as_hijacker(&self) -> Option<&dyn Hijacker> {
        None
    }

    fn as_pusher(&self) -> Option<&dyn Pusher> {
        None
    }

    fn as_reader_from(&self) -> Option<&dyn ReaderFrom> {
        None
    }

    /// Deprecated disconnect notification, kept for sinks that still offer it.
    fn as_close_notifier(&self) -> Option<&dyn CloseNotifier> {
        None
    }

    /// The sink this one wraps, if any.
    fn inner_sink(&self) -> Option<&dyn ResponseSink> {
        None
    }
}

/// `io::Write` view of a sink.
///
/// `flush` forwards to the sink's `Flusher` when it has one.
pub struct BodyWriter<'a> {
    sink: &'a dyn ResponseSink,
}

impl<'a> BodyWriter<'a> {
    pub fn new(sink: &'a dyn ResponseSink) -> Self {
        Self { sink }
    }
}

impl Write for BodyWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_flusher() {
            Some(flusher) => flusher.flush(),
            None => Ok(()),
        }
    }
}

/// Copy `src` into the sink body.
///
/// Prefers the sink's own `ReaderFrom`, then a source-driven transfer, then
/// a plain buffered copy through `write`.
pub fn copy(sink: &dyn ResponseSink, src: &mut dyn BodySource) -> io::Result<u64> {
    if let Some(reader_from) = sink.as_reader_from() {
        return reader_from.read_from(src);
    }

    let mut writer = BodyWriter::new(sink);
    if let Some(result) = src.write_to(&mut writer) {
        return result;
    }
    io::copy(src, &mut writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::recorder::ResponseRecorder;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::HeaderValue;
    use std::io::Cursor;

    #[test]
    fn headers_handle_is_shared() {
        let headers = Headers::new();
        let other = headers.clone();
        other
            .lock()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        assert!(headers.ptr_eq(&other));
        assert_eq!(headers.snapshot().get(CONTENT_TYPE).unwrap(), "text/plain");
        assert!(!headers.ptr_eq(&Headers::new()));
    }

    #[test]
    fn body_writer_supports_format_macros() {
        let recorder = ResponseRecorder::new();
        writeln!(BodyWriter::new(&recorder), "Hello world").unwrap();
        assert_eq!(recorder.body_string(), "Hello world\n");
        assert_eq!(recorder.status(), StatusCode::OK);
    }

    #[test]
    fn copy_without_reader_from_uses_write() {
        let recorder = ResponseRecorder::with_capabilities(Capabilities::NONE);
        let mut src = Opaque(Cursor::new(vec![7u8; 100_000]));

        let n = copy(&recorder, &mut src).unwrap();

        assert_eq!(n, 100_000);
        assert_eq!(recorder.body().len(), 100_000);
        assert_eq!(recorder.native_transfers(), 0);
    }

    #[test]
    fn copy_prefers_native_reader_from() {
        let recorder = ResponseRecorder::with_capabilities(Capabilities::ALL);
        let mut src = Cursor::new(b"abc".to_vec());

        assert_eq!(copy(&recorder, &mut src).unwrap(), 3);
        assert_eq!(recorder.native_transfers(), 1);
    }
}
